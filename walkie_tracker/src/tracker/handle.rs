use std::{future::pending, ops::ControlFlow};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::Interval,
};
use walkie_lib::{
    position::Position,
    stats::WalkStats,
    walk::{PetId, WalkSummary},
};

use crate::{
    location::{GeolocationSource, LocationEvent, PositionWatch},
    persistence::WalkPersistence,
    session::WalkState,
    TrackerError,
};

use super::WalkTracker;

const COMMAND_BUFFER: usize = 32;

/// Everything a map view needs to redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub state: WalkState,
    pub stats: WalkStats,
    pub route: Vec<Position>,
    pub last_position: Option<Position>,
    pub last_finished_route: Option<Vec<Position>>,
    pub last_error: Option<String>,
}

enum Command {
    Start {
        pet_id: Option<PetId>,
        reply: oneshot::Sender<Result<(), TrackerError>>,
    },
    Pause {
        reply: oneshot::Sender<Result<(), TrackerError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<(), TrackerError>>,
    },
    Finish {
        reply: oneshot::Sender<Result<WalkSummary, TrackerError>>,
    },
    Locate {
        reply: oneshot::Sender<Result<Position, TrackerError>>,
    },
    Stats {
        reply: oneshot::Sender<WalkStats>,
    },
    Snapshot {
        reply: oneshot::Sender<TrackerSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable front for a tracker running on its own task. The task stops once
/// every handle is dropped.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    stats: watch::Receiver<WalkStats>,
}

impl TrackerHandle {
    pub async fn start(&self, pet_id: Option<PetId>) -> Result<(), TrackerError> {
        self.request(|reply| Command::Start { pet_id, reply }).await?
    }

    pub async fn pause(&self) -> Result<(), TrackerError> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<(), TrackerError> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    pub async fn finish(&self) -> Result<WalkSummary, TrackerError> {
        self.request(|reply| Command::Finish { reply }).await?
    }

    pub async fn locate(&self) -> Result<Position, TrackerError> {
        self.request(|reply| Command::Locate { reply }).await?
    }

    pub async fn stats(&self) -> Result<WalkStats, TrackerError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn snapshot(&self) -> Result<TrackerSnapshot, TrackerError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stops the task even while other handles are still around. Their later calls
    /// fail with `TrackerStopped`.
    pub async fn shutdown(&self) -> Result<(), TrackerError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Receives stats on every tick, accepted sample and state change.
    pub fn subscribe_stats(&self) -> watch::Receiver<WalkStats> {
        self.stats.clone()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, TrackerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| TrackerError::TrackerStopped)?;
        response.await.map_err(|_| TrackerError::TrackerStopped)
    }
}

impl<G: GeolocationSource, P: WalkPersistence> WalkTracker<G, P> {
    /// Moves the tracker onto its own task. The join handle gives the tracker back once
    /// all handles are gone.
    pub fn spawn(self) -> (TrackerHandle, JoinHandle<Self>) {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let handle = TrackerHandle {
            commands,
            stats: self.subscribe_stats(),
        };
        (handle, tokio::spawn(self.run(receiver)))
    }

    /// Serializes commands, location samples and ticks; each one runs to completion
    /// before the next is looked at.
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Self {
        loop {
            tokio::select! {
                // Samples already delivered are handled before a command that came after them.
                biased;

                event = next_location(&mut self.subscription) => match event {
                    Some(event) => self.handle_location_event(event),
                    None => {
                        tracing::debug!("Location source ended the watch");
                        self.subscription = None;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = next_tick(&mut self.ticker) => self.tick(),
            }
        }

        tracing::debug!("Tracker task stopping");
        self.stop_sampling();
        self
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        // A caller that stopped waiting for its reply is not an error.
        match command {
            Command::Start { pet_id, reply } => {
                let _ = reply.send(self.start(pet_id).await);
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            Command::Finish { reply } => {
                let _ = reply.send(self.finish().await);
            }
            Command::Locate { reply } => {
                let _ = reply.send(self.locate().await);
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.current_stats());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            state: self.state(),
            stats: self.current_stats(),
            route: self.session.route().to_vec(),
            last_position: self.last_position,
            last_finished_route: self.last_finished_route.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

async fn next_location(subscription: &mut Option<PositionWatch>) -> Option<LocationEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}
