use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use walkie_lib::{
    position::Position,
    stats::{estimate_calories, WalkStats},
};

use crate::{config::TrackerConfig, geo::distance_between, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Idle,
    Active,
    Paused { paused_at: DateTime<Utc> },
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkState::Idle => write!(f, "idle"),
            WalkState::Active => write!(f, "active"),
            WalkState::Paused { .. } => write!(f, "paused"),
        }
    }
}

/// What happened to a location sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// The walk is not active.
    Ignored,
    /// First point of the walk; no distance yet.
    First,
    Accepted { meters: f64 },
    /// Within the noise threshold of the last accepted point.
    Noise { meters: f64 },
}

/// One walk's accumulators. Every operation takes the current time explicitly, so the
/// session itself never reads a clock.
#[derive(Debug, Clone)]
pub struct WalkSession {
    state: WalkState,
    started_at: Option<DateTime<Utc>>,
    accumulated_paused: TimeDelta,
    total_distance_m: f64,
    route: Vec<Position>,

    noise_threshold_m: f64,
    kcal_per_km: f64,
}

impl WalkSession {
    pub fn new(noise_threshold_m: f64, kcal_per_km: f64) -> Self {
        Self {
            state: WalkState::Idle,
            started_at: None,
            accumulated_paused: TimeDelta::zero(),
            total_distance_m: 0.0,
            route: Vec::new(),
            noise_threshold_m,
            kcal_per_km,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.noise_threshold_m, config.kcal_per_km)
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn accumulated_paused(&self) -> TimeDelta {
        self.accumulated_paused
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn route(&self) -> &[Position] {
        &self.route
    }

    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<(), TrackerError> {
        if self.state != WalkState::Idle {
            return Err(self.invalid("start"));
        }

        self.reset();
        self.started_at = Some(now);
        self.state = WalkState::Active;
        Ok(())
    }

    pub fn record_sample(&mut self, position: Position) -> SampleOutcome {
        if self.state != WalkState::Active {
            return SampleOutcome::Ignored;
        }

        let Some(last) = self.route.last() else {
            self.route.push(position);
            return SampleOutcome::First;
        };

        // Compared against the last accepted point, not the last sample seen.
        let meters = distance_between(last, &position);
        if meters > self.noise_threshold_m {
            self.route.push(position);
            self.total_distance_m += meters;
            SampleOutcome::Accepted { meters }
        } else {
            SampleOutcome::Noise { meters }
        }
    }

    /// `Ok(false)` when the walk was already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<bool, TrackerError> {
        match self.state {
            WalkState::Active => {
                self.state = WalkState::Paused { paused_at: now };
                Ok(true)
            }
            WalkState::Paused { .. } => Ok(false),
            WalkState::Idle => Err(self.invalid("pause")),
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TrackerError> {
        let WalkState::Paused { paused_at } = self.state else {
            return Err(self.invalid("resume"));
        };

        self.accumulated_paused += (now - paused_at).max(TimeDelta::zero());
        self.state = WalkState::Active;
        Ok(())
    }

    pub fn duration_seconds(&self, now: DateTime<Utc>) -> u64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };

        let until = match self.state {
            WalkState::Active => now,
            WalkState::Paused { paused_at } => paused_at,
            WalkState::Idle => return 0,
        };

        let active = until - started_at - self.accumulated_paused;
        (active.num_milliseconds().max(0) / 1000) as u64
    }

    pub fn stats(&self, now: DateTime<Utc>) -> WalkStats {
        let distance_meters = self.total_distance_m.round() as u64;

        WalkStats {
            duration_seconds: self.duration_seconds(now),
            distance_meters,
            calories: estimate_calories(distance_meters, self.kcal_per_km),
        }
    }

    /// Final numbers for a walk that is about to be submitted. Leaves the session as is.
    pub fn summary(&self, now: DateTime<Utc>) -> Result<WalkStats, TrackerError> {
        if self.state == WalkState::Idle {
            return Err(self.invalid("finish"));
        }
        Ok(self.stats(now))
    }

    /// Ends the walk and hands back its route.
    pub fn end(&mut self) -> Result<Vec<Position>, TrackerError> {
        if self.state == WalkState::Idle {
            return Err(self.invalid("finish"));
        }

        let route = std::mem::take(&mut self.route);
        self.reset();
        Ok(route)
    }

    fn reset(&mut self) {
        self.state = WalkState::Idle;
        self.started_at = None;
        self.accumulated_paused = TimeDelta::zero();
        self.total_distance_m = 0.0;
        self.route.clear();
    }

    fn invalid(&self, action: &'static str) -> TrackerError {
        TrackerError::InvalidTransition { from: self.state, action }
    }
}
