use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use caravan_common::types::{AgentMode, ConnectionState, ConsoleStatus};
use caravan_storage::{StorageError, Store};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, DispatcherContext};

#[derive(Debug, thiserror::Error)]
pub enum ModeError {
    /// Reconnecting is refused after an authoritative console failure; only
    /// a process restart re-arms the dispatcher.
    #[error("cannot reconnect after a fatal console failure")]
    Conflict,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

struct DispatcherHandle {
    close_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the persisted agent mode and the dispatcher lifecycle.
///
/// Mode transitions are serialized by one async mutex: at most one dispatcher
/// task exists, and spawning/stopping never races the scheduler.
pub struct ModeController {
    store: Arc<Store>,
    default_mode: AgentMode,
    ctx: DispatcherContext,
    console_status: Arc<Mutex<ConsoleStatus>>,
    fatal_stopped: Arc<AtomicBool>,
    dispatcher: tokio::sync::Mutex<Option<DispatcherHandle>>,
}

impl ModeController {
    pub fn new(store: Arc<Store>, ctx: DispatcherContext, default_mode: AgentMode) -> Self {
        let target = match default_mode {
            AgentMode::Connected => ConnectionState::Connected,
            AgentMode::Disconnected => ConnectionState::Disconnected,
        };
        Self {
            store,
            default_mode,
            ctx,
            console_status: Arc::new(Mutex::new(ConsoleStatus::new(target))),
            fatal_stopped: Arc::new(AtomicBool::new(false)),
            dispatcher: tokio::sync::Mutex::new(None),
        }
    }

    /// Resolves the operating mode on startup and spawns the dispatcher when
    /// it comes out connected. The persisted mode wins over the configured
    /// default; the default applies only while the table is empty.
    pub async fn startup(&self) -> Result<AgentMode, ModeError> {
        let mode = self.mode().await?;
        if mode == AgentMode::Connected {
            let mut guard = self.dispatcher.lock().await;
            self.set_target(ConnectionState::Connected);
            *guard = Some(self.spawn_dispatcher());
        }
        tracing::info!(mode = %mode, "agent mode resolved");
        Ok(mode)
    }

    /// The effective mode: persisted value, or the configured default when
    /// nothing has been saved yet.
    pub async fn mode(&self) -> Result<AgentMode, ModeError> {
        match self.store.get_configuration().await {
            Ok(config) => Ok(config.agent_mode),
            Err(err) if err.is_not_found() => Ok(self.default_mode),
            Err(err) => Err(err.into()),
        }
    }

    /// Persists the target mode and reconciles the dispatcher.
    ///
    /// Saving an unchanged mode is tolerated (plain upsert). While
    /// `fatal_stopped` is set, transitions that would start the dispatcher
    /// are refused with [`ModeError::Conflict`] before anything is written.
    pub async fn set_mode(&self, mode: AgentMode) -> Result<(), ModeError> {
        let mut guard = self.dispatcher.lock().await;

        match mode {
            AgentMode::Connected => {
                if self.fatal_stopped.load(Ordering::SeqCst) {
                    return Err(ModeError::Conflict);
                }
                self.store.save_configuration(mode).await?;
                self.set_target(ConnectionState::Connected);
                if guard.is_none() {
                    *guard = Some(self.spawn_dispatcher());
                }
            }
            AgentMode::Disconnected => {
                self.store.save_configuration(mode).await?;
                self.set_target(ConnectionState::Disconnected);
                if let Some(handle) = guard.take() {
                    let _ = handle.close_tx.send(true);
                    let _ = handle.task.await;
                }
            }
        }

        tracing::info!(mode = %mode, "agent mode changed");
        Ok(())
    }

    /// Snapshot of the console-facing status.
    pub fn console_status(&self) -> ConsoleStatus {
        self.console_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// True while a dispatcher task is alive. A fatally-stopped dispatcher
    /// counts as not running.
    pub async fn is_dispatcher_running(&self) -> bool {
        let guard = self.dispatcher.lock().await;
        guard
            .as_ref()
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }

    fn set_target(&self, target: ConnectionState) {
        self.console_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .target = target;
    }

    fn spawn_dispatcher(&self) -> DispatcherHandle {
        let (close_tx, close_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(
            self.ctx.clone(),
            self.console_status.clone(),
            self.fatal_stopped.clone(),
            close_rx,
        );
        let task = tokio::spawn(dispatcher.run());
        tracing::debug!("dispatcher spawned");
        DispatcherHandle { close_tx, task }
    }
}
