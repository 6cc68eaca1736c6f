use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::watch,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use walkie_lib::{
    position::Position,
    stats::WalkStats,
    walk::{FinishWalkRequest, PetId, WalkId, WalkSummary},
};

use crate::{
    clock::{Clock, SystemClock},
    config::TrackerConfig,
    location::{GeolocationSource, LocationError, LocationEvent, PositionWatch},
    persistence::WalkPersistence,
    session::{SampleOutcome, WalkSession, WalkState},
    TrackerError, ValidationError,
};

mod handle;
#[cfg(test)]
pub(crate) mod testing;

pub use handle::{TrackerHandle, TrackerSnapshot};

#[derive(Debug, Clone, Copy)]
struct ActiveWalk {
    walk_id: WalkId,
    pet_id: PetId,
}

/// Owns the one walk session together with everything that feeds it: the location
/// subscription, the stats tick and the backend client.
pub struct WalkTracker<G: GeolocationSource, P: WalkPersistence> {
    config: TrackerConfig,
    geolocation: G,
    persistence: P,
    clock: Arc<dyn Clock>,

    session: WalkSession,
    walk: Option<ActiveWalk>,
    /// Set by the first finish attempt, so retries submit identical numbers.
    finish_requested_at: Option<DateTime<Utc>>,

    subscription: Option<PositionWatch>,
    ticker: Option<Interval>,
    stats_tx: watch::Sender<WalkStats>,

    last_position: Option<Position>,
    last_finished_route: Option<Vec<Position>>,
    last_error: Option<String>,
}

impl<G: GeolocationSource, P: WalkPersistence> WalkTracker<G, P> {
    pub fn new(config: TrackerConfig, geolocation: G, persistence: P) -> Self {
        Self::with_clock(config, geolocation, persistence, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TrackerConfig, geolocation: G, persistence: P, clock: Arc<dyn Clock>) -> Self {
        let (stats_tx, _) = watch::channel(WalkStats::default());

        Self {
            session: WalkSession::from_config(&config),
            config,
            geolocation,
            persistence,
            clock,
            walk: None,
            finish_requested_at: None,
            subscription: None,
            ticker: None,
            stats_tx,
            last_position: None,
            last_finished_route: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> WalkState {
        self.session.state()
    }

    pub fn session(&self) -> &WalkSession {
        &self.session
    }

    pub fn walk_id(&self) -> Option<WalkId> {
        self.walk.map(|walk| walk.walk_id)
    }

    /// While a finish is pending, stats stay at the moment it was first requested.
    pub fn current_stats(&self) -> WalkStats {
        let now = self.finish_requested_at.unwrap_or_else(|| self.clock.now());
        self.session.stats(now)
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<WalkStats> {
        self.stats_tx.subscribe()
    }

    /// Most recent sample, accepted or not.
    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    pub fn last_finished_route(&self) -> Option<&[Position]> {
        self.last_finished_route.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_sampling(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// One-shot fix, used to show where the user is before a walk starts.
    pub async fn locate(&mut self) -> Result<Position, TrackerError> {
        let fix = Self::request_fix(&self.geolocation, self.config.fix_timeout)
            .await
            .map_err(TrackerError::from);
        let position = self.report(fix)?;
        self.last_position = Some(position);
        Ok(position)
    }

    pub async fn start(&mut self, pet_id: Option<PetId>) -> Result<(), TrackerError> {
        let result = self.try_start(pet_id).await;
        self.report(result)
    }

    async fn try_start(&mut self, pet_id: Option<PetId>) -> Result<(), TrackerError> {
        let pet_id = pet_id.ok_or(ValidationError::NoPetSelected)?;

        let state = self.session.state();
        if state != WalkState::Idle {
            return Err(TrackerError::InvalidTransition { from: state, action: "start" });
        }

        let fix = Self::request_fix(&self.geolocation, self.config.fix_timeout).await?;
        let subscription = self.geolocation.watch_position().await?;
        // The subscription is dropped, and so cancelled, if the backend refuses.
        let walk_id = self.persistence.start_walk(pet_id).await?;

        self.session.begin(self.clock.now())?;
        self.session.record_sample(fix);
        self.walk = Some(ActiveWalk { walk_id, pet_id });
        self.finish_requested_at = None;
        self.subscription = Some(subscription);
        self.last_position = Some(fix);
        self.last_finished_route = None;
        self.last_error = None;
        self.enable_tick();
        self.publish_stats();

        tracing::info!("Walk {} started for pet {}", walk_id, pet_id);
        Ok(())
    }

    pub fn record_sample(&mut self, position: Position) -> SampleOutcome {
        if self.session.state() != WalkState::Active {
            tracing::trace!("Dropping sample outside an active walk");
            return SampleOutcome::Ignored;
        }

        self.last_position = Some(position);
        let outcome = self.session.record_sample(position);

        match outcome {
            SampleOutcome::Accepted { meters } => {
                tracing::debug!("Accepted sample, +{:.1} m, total {:.1} m", meters, self.session.total_distance_m());
                self.publish_stats();
            }
            SampleOutcome::Noise { meters } => tracing::trace!("Discarded sample {:.2} m from last point", meters),
            SampleOutcome::First | SampleOutcome::Ignored => {}
        }

        outcome
    }

    /// Location errors while walking are reported but never change the walk's state.
    pub fn handle_location_event(&mut self, event: LocationEvent) {
        match event {
            Ok(position) => {
                self.record_sample(position);
            }
            Err(err) => {
                tracing::warn!("Location error during walk: {}", err);
                self.last_error = Some(TrackerError::from(err).to_string());
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), TrackerError> {
        let paused = self.session.pause(self.clock.now());

        if self.report(paused)? {
            self.stop_sampling();
            self.finish_requested_at = None;
            self.publish_stats();
            tracing::info!("Walk paused at {}s", self.current_stats().duration_seconds);
        } else {
            tracing::debug!("Walk already paused");
        }

        Ok(())
    }

    pub async fn resume(&mut self) -> Result<(), TrackerError> {
        let resumed = self.session.resume(self.clock.now());
        self.report(resumed)?;

        self.finish_requested_at = None;
        self.enable_tick();

        // Most location APIs cannot pause a watch, so resuming opens a fresh one.
        match self.geolocation.watch_position().await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(err) => {
                tracing::warn!("Resumed without location updates: {}", err);
                self.last_error = Some(TrackerError::from(err).to_string());
            }
        }

        self.publish_stats();
        tracing::info!("Walk resumed, {}s paused so far", self.session.accumulated_paused().num_seconds());
        Ok(())
    }

    /// Submits the walk. On failure nothing collected so far is dropped and the call can be retried.
    pub async fn finish(&mut self) -> Result<WalkSummary, TrackerError> {
        let result = self.try_finish().await;
        self.report(result)
    }

    async fn try_finish(&mut self) -> Result<WalkSummary, TrackerError> {
        let finished_at = *self.finish_requested_at.get_or_insert_with(|| self.clock.now());
        let stats = match self.session.summary(finished_at) {
            Ok(stats) => stats,
            Err(err) => {
                self.finish_requested_at = None;
                return Err(err);
            }
        };
        let walk = self.walk.ok_or(TrackerError::InvalidTransition {
            from: self.session.state(),
            action: "finish",
        })?;

        self.stop_sampling();

        let request = FinishWalkRequest::new(self.session.route(), &stats);
        if let Err(err) = self.persistence.finish_walk(walk.walk_id, &request).await {
            self.publish_stats();
            return Err(err.into());
        }

        let route = self.session.end()?;
        self.walk = None;
        self.finish_requested_at = None;
        self.last_finished_route = Some(route.clone());
        self.last_error = None;
        self.publish_stats();

        tracing::info!(
            "Walk {} finished: {} m in {}s, {} kcal",
            walk.walk_id,
            stats.distance_meters,
            stats.duration_seconds,
            stats.calories
        );

        Ok(WalkSummary {
            walk_id: walk.walk_id,
            pet_id: walk.pet_id,
            stats,
            route,
        })
    }

    /// Periodic refresh so the duration readout advances between samples.
    pub fn tick(&mut self) {
        if self.session.state() == WalkState::Active {
            self.publish_stats();
        }
    }

    // Borrows only the source, so callers holding `&mut self` stay `Send`.
    async fn request_fix(geolocation: &G, timeout: Duration) -> Result<Position, LocationError> {
        match tokio::time::timeout(timeout, geolocation.current_position()).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        }
    }

    fn enable_tick(&mut self) {
        let period = self.config.tick_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn stop_sampling(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.ticker = None;
    }

    fn publish_stats(&self) {
        self.stats_tx.send_replace(self.current_stats());
    }

    fn report<T>(&mut self, result: Result<T, TrackerError>) -> Result<T, TrackerError> {
        if let Err(err) = &result {
            tracing::warn!("{}", err);
            self.last_error = Some(err.to_string());
        }
        result
    }
}
