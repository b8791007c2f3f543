use crate::core::events::SupervisorEvent;
use crate::core::model::GameRecord;
use crate::error::LaunchError;
use crate::plugins::registry::{GameRuntime, Presence, PresenceReporter};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

struct Inner {
    runtime: Arc<dyn GameRuntime>,
    presence: Arc<dyn PresenceReporter>,
    poll_interval: Duration,
    running: RwLock<HashSet<GameRecord>>,
    launching: Mutex<Option<GameRecord>>,
    event_tx: broadcast::Sender<SupervisorEvent>,
}

/// Tracks launched games until their processes go away.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    pub fn new(runtime: Arc<dyn GameRuntime>, presence: Arc<dyn PresenceReporter>, poll_interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                runtime,
                presence,
                poll_interval,
                running: RwLock::new(HashSet::new()),
                launching: Mutex::new(None),
                event_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn running_games(&self) -> Vec<GameRecord> {
        self.inner.running.read().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    pub fn is_running(&self, game_id: &str) -> bool {
        self.inner
            .running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|g| g.id == game_id)
    }

    pub fn launching(&self) -> Option<GameRecord> {
        self.launching_slot().clone()
    }

    /// Marks a launch in progress (`Some`) or finished (`None`).
    ///
    /// Clearing a previously set slot moves that game into the running set
    /// and monitors it on a detached task, whose handle is returned. `None`
    /// comes back if nothing was launching or the game is already monitored.
    pub fn set_launching(&self, game: Option<GameRecord>) -> Option<JoinHandle<()>> {
        let launched = {
            let mut slot = self.launching_slot();
            let previous = std::mem::replace(&mut *slot, game.clone());
            match (previous, &game) {
                (Some(displaced), Some(next)) if displaced.id != next.id => {
                    tracing::warn!(
                        game = %displaced.title,
                        replaced_by = %next.title,
                        "launch slot overwritten, game will not be monitored"
                    );
                    None
                }
                (Some(launched), None) => {
                    // Slot lock still held: the game is always in one of the two.
                    if self.claim_running(&launched) {
                        Some(launched)
                    } else {
                        tracing::debug!(game = %launched.title, "already monitored");
                        None
                    }
                }
                _ => None,
            }
        };

        if let Some(game) = game {
            tracing::debug!(game = %game.title, "launching");
            let _ = self.inner.event_tx.send(SupervisorEvent::GameLaunching {
                game_id: game.id.clone(),
                title: game.title.clone(),
            });
            return None;
        }

        let launched = launched?;
        let supervisor = self.clone();
        Some(tokio::spawn(async move { supervisor.monitor(launched).await }))
    }

    /// Launches `game` through the runtime and starts monitoring it.
    pub async fn launch(&self, game: &GameRecord) -> Result<JoinHandle<()>, LaunchError> {
        {
            let mut slot = self.launching_slot();
            if self.is_running(&game.id) {
                return Err(LaunchError::AlreadyRunning(game.title.clone()));
            }
            if let Some(other) = slot.as_ref() {
                return Err(LaunchError::Busy(other.title.clone()));
            }
            *slot = Some(game.clone());
        }
        let _ = self.inner.event_tx.send(SupervisorEvent::GameLaunching {
            game_id: game.id.clone(),
            title: game.title.clone(),
        });

        if let Err(e) = self.inner.runtime.launch(game).await {
            *self.launching_slot() = None;
            tracing::error!(game = %game.title, error = %format!("{:#}", e), "launch failed");
            let _ = self.inner.event_tx.send(SupervisorEvent::LaunchFailed {
                game_id: game.id.clone(),
                title: game.title.clone(),
                message: format!("{:#}", e),
            });
            return Err(LaunchError::Runtime { title: game.title.clone(), source: e });
        }

        self.set_launching(None)
            .ok_or_else(|| LaunchError::AlreadyRunning(game.title.clone()))
    }

    /// Polls the runtime until `game` is no longer alive.
    ///
    /// One loop per distinct game: if the game is already being monitored
    /// this returns immediately.
    pub async fn begin_monitoring(&self, game: GameRecord) {
        if !self.claim_running(&game) {
            tracing::debug!(game = %game.title, "already monitored");
            return;
        }
        self.monitor(game).await
    }

    fn claim_running(&self, game: &GameRecord) -> bool {
        self.inner
            .running
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game.clone())
    }

    /// Loop body for a game already in the running set.
    async fn monitor(&self, game: GameRecord) {
        tracing::info!(game = %game.title, interval = ?self.inner.poll_interval, "monitoring game process");
        self.inner.presence.report(Presence::Playing { title: game.title.clone() });
        let _ = self.inner.event_tx.send(SupervisorEvent::GameStarted {
            game_id: game.id.clone(),
            title: game.title.clone(),
        });

        loop {
            tokio::time::sleep(self.inner.poll_interval).await;
            if !self.inner.runtime.is_alive(&game).await {
                break;
            }
        }

        self.inner.running.write().unwrap_or_else(PoisonError::into_inner).remove(&game);
        tracing::info!(game = %game.title, "game exited");
        self.inner.presence.report(Presence::Idle);
        let _ = self.inner.event_tx.send(SupervisorEvent::GameExited {
            game_id: game.id.clone(),
            title: game.title.clone(),
        });
    }

    fn launching_slot(&self) -> MutexGuard<'_, Option<GameRecord>> {
        self.inner.launching.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
