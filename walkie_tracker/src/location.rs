use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use walkie_lib::position::Position;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("timed out waiting for a location fix")]
    Timeout,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

pub type LocationEvent = Result<Position, LocationError>;

/// Device location, either one fix at a time or as a continuous watch.
#[async_trait]
pub trait GeolocationSource: Send + Sync + 'static {
    async fn current_position(&self) -> Result<Position, LocationError>;

    /// Opens a continuous subscription. Samples and errors arrive on the watch in
    /// delivery order until it is cancelled or dropped.
    async fn watch_position(&self) -> Result<PositionWatch, LocationError>;
}

/// A live location subscription. Dropping it is the same as cancelling it.
pub struct PositionWatch {
    receiver: mpsc::Receiver<LocationEvent>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl PositionWatch {
    pub fn new(receiver: mpsc::Receiver<LocationEvent>) -> Self {
        Self {
            receiver,
            on_cancel: None,
        }
    }

    /// `on_cancel` runs exactly once, when the watch is cancelled or dropped.
    pub fn with_cancel(receiver: mpsc::Receiver<LocationEvent>, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            receiver,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// A bounded watch together with the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<LocationEvent>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(receiver))
    }

    /// `None` once the source has stopped producing.
    pub async fn next(&mut self) -> Option<LocationEvent> {
        self.receiver.recv().await
    }

    pub fn cancel(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.receiver.close();
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use chrono::DateTime;

    use super::*;

    #[tokio::test]
    async fn delivers_in_order() {
        let (sender, mut watch) = PositionWatch::channel(4);
        let t = DateTime::from_timestamp(0, 0).unwrap();

        sender.send(Ok(Position::new(1.0, 1.0, t))).await.unwrap();
        sender.send(Err(LocationError::Timeout)).await.unwrap();
        sender.send(Ok(Position::new(2.0, 2.0, t))).await.unwrap();
        drop(sender);

        assert_eq!(watch.next().await.unwrap().unwrap().latitude, 1.0);
        assert_eq!(watch.next().await.unwrap(), Err(LocationError::Timeout));
        assert_eq!(watch.next().await.unwrap().unwrap().latitude, 2.0);
        assert!(watch.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_closes_channel_and_runs_hook_once() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::channel(4);
        let counter = cancelled.clone();
        let watch = PositionWatch::with_cancel(receiver, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        watch.cancel();

        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(sender.is_closed());
        let t = DateTime::from_timestamp(0, 0).unwrap();
        assert!(sender.try_send(Ok(Position::new(0.0, 0.0, t))).is_err());
    }

    #[tokio::test]
    async fn drop_counts_as_cancel() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let (_sender, receiver) = mpsc::channel(1);
        let counter = cancelled.clone();
        drop(PositionWatch::with_cancel(receiver, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }
}
