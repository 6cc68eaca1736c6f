use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;
use walkie_lib::{
    position::Position,
    walk::{PetId, WalkSummary},
};
use walkie_tracker::{
    clock::ManualClock,
    location::{GeolocationSource, LocationError, PositionWatch},
    TrackerHandle,
};

/// Plays a recorded track back as if the device were reporting it live.
///
/// The shared clock follows the timestamps of the points handed out, so walk durations
/// match the recording rather than how fast the replay runs. A watch resumes where the
/// previous one was cancelled.
pub struct GpxReplaySource {
    track: Arc<Vec<Position>>,
    cursor: Arc<AtomicUsize>,
    clock: ManualClock,
    interval: Duration,
    done: Arc<Notify>,
}

impl GpxReplaySource {
    pub fn new(track: Vec<Position>, clock: ManualClock, interval: Duration) -> Self {
        Self {
            track: Arc::new(track),
            cursor: Arc::new(AtomicUsize::new(0)),
            clock,
            interval,
            done: Arc::new(Notify::new()),
        }
    }

    /// Notified once the last point of the track has been delivered.
    pub fn completion(&self) -> Arc<Notify> {
        self.done.clone()
    }
}

#[async_trait]
impl GeolocationSource for GpxReplaySource {
    async fn current_position(&self) -> Result<Position, LocationError> {
        let index = self.cursor.load(Ordering::SeqCst).min(self.track.len().saturating_sub(1));
        let position = *self
            .track
            .get(index)
            .ok_or_else(|| LocationError::Unavailable("track has no points".into()))?;

        self.clock.set(position.timestamp);
        Ok(position)
    }

    async fn watch_position(&self) -> Result<PositionWatch, LocationError> {
        let (sender, watch) = PositionWatch::channel(1);
        let track = self.track.clone();
        let cursor = self.cursor.clone();
        let clock = self.clock.clone();
        let interval = self.interval;
        let done = self.done.clone();

        tokio::spawn(async move {
            loop {
                let index = cursor.load(Ordering::SeqCst);
                let Some(position) = track.get(index).copied() else {
                    tracing::debug!("Replay delivered all {} points", track.len());
                    done.notify_one();
                    break;
                };

                if sender.send(Ok(position)).await.is_err() {
                    tracing::debug!("Replay watch cancelled at point {}", index);
                    break;
                }
                clock.set(position.timestamp);
                cursor.store(index + 1, Ordering::SeqCst);

                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }
        });

        Ok(watch)
    }
}

/// Runs one full walk over the replayed track and returns what the tracker submitted.
pub async fn run_replay(handle: &TrackerHandle, completion: Arc<Notify>, pet_id: PetId) -> anyhow::Result<WalkSummary> {
    handle.start(Some(pet_id)).await?;
    tracing::info!("Replay started for pet {}", pet_id);

    completion.notified().await;

    let snapshot = handle.snapshot().await?;
    tracing::debug!(
        "Replay finished feeding: {} route points, {} m so far",
        snapshot.route.len(),
        snapshot.stats.distance_meters
    );

    let summary = handle.finish().await?;
    Ok(summary)
}
