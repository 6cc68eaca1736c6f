pub mod clock;
pub mod config;
mod error;
pub mod geo;
pub mod location;
pub mod persistence;
pub mod session;
pub mod tracker;

pub use error::*;
pub use tracker::{TrackerHandle, TrackerSnapshot, WalkTracker};
