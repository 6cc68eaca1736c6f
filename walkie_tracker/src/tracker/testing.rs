use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use walkie_lib::{
    position::Position,
    walk::{FinishWalkRequest, PetId, WalkId},
};

use crate::{
    clock::Clock,
    location::{GeolocationSource, LocationError, LocationEvent, PositionWatch},
    persistence::{PersistenceError, WalkPersistence},
};

/// Geolocation whose fixes are scripted and whose watches are fed by the test.
#[derive(Clone, Default)]
pub struct FakeGeolocation {
    inner: Arc<Mutex<FakeGeolocationInner>>,
    cancellations: Arc<AtomicUsize>,
}

#[derive(Default)]
struct FakeGeolocationInner {
    fixes: VecDeque<Result<Position, LocationError>>,
    watch_failures: VecDeque<LocationError>,
    senders: Vec<mpsc::Sender<LocationEvent>>,
    opened: usize,
}

impl FakeGeolocation {
    pub fn push_fix(&self, fix: Result<Position, LocationError>) {
        self.inner.lock().unwrap().fixes.push_back(fix);
    }

    pub fn fail_next_watch(&self, err: LocationError) {
        self.inner.lock().unwrap().watch_failures.push_back(err);
    }

    /// Sender of the most recently opened watch.
    pub fn latest_sender(&self) -> mpsc::Sender<LocationEvent> {
        self.inner.lock().unwrap().senders.last().cloned().expect("no watch opened")
    }

    pub fn watches_opened(&self) -> usize {
        self.inner.lock().unwrap().opened
    }

    /// Drops the source's side of every watch, as if the device stopped reporting.
    pub fn end_watches(&self) {
        self.inner.lock().unwrap().senders.clear();
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeolocationSource for FakeGeolocation {
    async fn current_position(&self) -> Result<Position, LocationError> {
        self.inner
            .lock()
            .unwrap()
            .fixes
            .pop_front()
            .unwrap_or_else(|| Err(LocationError::Unavailable("no fix scripted".into())))
    }

    async fn watch_position(&self) -> Result<PositionWatch, LocationError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.watch_failures.pop_front() {
            return Err(err);
        }

        let (sender, receiver) = mpsc::channel(16);
        inner.senders.push(sender);
        inner.opened += 1;
        let cancellations = self.cancellations.clone();
        Ok(PositionWatch::with_cancel(receiver, move || {
            cancellations.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Backend that hands out walk ids and can be told to fail.
#[derive(Clone, Default)]
pub struct FakePersistence {
    inner: Arc<Mutex<FakePersistenceInner>>,
}

#[derive(Default)]
struct FakePersistenceInner {
    start_failures: VecDeque<PersistenceError>,
    finish_failures: VecDeque<PersistenceError>,
    started: Vec<PetId>,
    finish_attempts: Vec<(WalkId, FinishWalkRequest)>,
    finished: Vec<(WalkId, FinishWalkRequest)>,
}

impl FakePersistence {
    pub fn fail_next_start(&self, err: PersistenceError) {
        self.inner.lock().unwrap().start_failures.push_back(err);
    }

    pub fn fail_next_finish(&self, err: PersistenceError) {
        self.inner.lock().unwrap().finish_failures.push_back(err);
    }

    pub fn started(&self) -> Vec<PetId> {
        self.inner.lock().unwrap().started.clone()
    }

    pub fn finish_attempts(&self) -> Vec<(WalkId, FinishWalkRequest)> {
        self.inner.lock().unwrap().finish_attempts.clone()
    }

    pub fn finished(&self) -> Vec<(WalkId, FinishWalkRequest)> {
        self.inner.lock().unwrap().finished.clone()
    }
}

#[async_trait]
impl WalkPersistence for FakePersistence {
    async fn start_walk(&self, pet_id: PetId) -> Result<WalkId, PersistenceError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.start_failures.pop_front() {
            return Err(err);
        }
        inner.started.push(pet_id);
        Ok(100 + inner.started.len() as WalkId)
    }

    async fn finish_walk(&self, walk_id: WalkId, request: &FinishWalkRequest) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.finish_attempts.push((walk_id, request.clone()));
        if let Some(err) = inner.finish_failures.pop_front() {
            return Err(err);
        }
        inner.finished.push((walk_id, request.clone()));
        Ok(())
    }
}

/// Wall clock that follows tokio's (pausable) time.
pub struct TokioClock {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + TimeDelta::from_std(self.started.elapsed()).unwrap()
    }
}
