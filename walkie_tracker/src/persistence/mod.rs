use async_trait::async_trait;
use thiserror::Error;
use walkie_lib::walk::{FinishWalkRequest, PetId, WalkId};

mod http;

pub use http::HttpWalkApi;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The walk endpoints of the backend. Calls may fail or time out; nothing here assumes
/// exactly-once delivery.
#[async_trait]
pub trait WalkPersistence: Send + Sync + 'static {
    async fn start_walk(&self, pet_id: PetId) -> Result<WalkId, PersistenceError>;

    async fn finish_walk(&self, walk_id: WalkId, request: &FinishWalkRequest) -> Result<(), PersistenceError>;
}
