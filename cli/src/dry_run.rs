use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use walkie_lib::walk::{FinishWalkRequest, PetId, WalkId};
use walkie_tracker::persistence::{PersistenceError, WalkPersistence};

/// Persistence that only logs what would have been sent to the backend.
pub struct DryRunPersistence {
    next_id: AtomicI64,
}

impl Default for DryRunPersistence {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl WalkPersistence for DryRunPersistence {
    async fn start_walk(&self, pet_id: PetId) -> Result<WalkId, PersistenceError> {
        let walk_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::info!("[dry run] POST /walks/start pet_id={} -> walk {}", pet_id, walk_id);
        Ok(walk_id)
    }

    async fn finish_walk(&self, walk_id: WalkId, request: &FinishWalkRequest) -> Result<(), PersistenceError> {
        tracing::info!(
            "[dry run] PUT /walks/finish/{} with {} points, {} m, {} s, {} kcal",
            walk_id,
            request.route_data.len(),
            request.distance,
            request.duration,
            request.calories
        );
        Ok(())
    }
}
