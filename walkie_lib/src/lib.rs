pub mod position;
pub mod stats;
pub mod walk;
