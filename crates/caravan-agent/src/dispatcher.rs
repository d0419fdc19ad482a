use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use caravan_collector::CollectorEngine;
use caravan_common::types::{ConnectionState, ConsoleStatus};
use caravan_console::{ConsoleClient, ConsoleError};
use caravan_scheduler::{Scheduler, WorkError, WorkFuture};
use caravan_storage::Store;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use uuid::Uuid;

/// Identity and cadence of the reporting loop.
#[derive(Clone)]
pub struct DispatcherSettings {
    pub agent_id: Uuid,
    pub source_id: Uuid,
    pub version: String,
    pub credential_url: String,
    pub update_interval: Duration,
    pub max_backoff: Duration,
    pub legacy_status_enabled: bool,
}

/// Everything a dispatcher run needs; owned by the mode controller so it can
/// spawn fresh dispatchers across mode transitions.
#[derive(Clone)]
pub struct DispatcherContext {
    pub scheduler: Arc<Scheduler>,
    pub client: Arc<ConsoleClient>,
    pub collector: Arc<CollectorEngine>,
    pub store: Arc<Store>,
    pub settings: DispatcherSettings,
}

/// Result of one tick's work unit.
enum DispatchOutcome {
    /// Status and inventory both transmitted; the hash to remember.
    InventorySent { hash: String },
    /// Status transmitted; inventory identical to the last transmission.
    InventoryUnchanged,
}

/// Exponential backoff: initial, 2x, 4x ... capped at max. Reset on success.
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: None,
        }
    }

    fn next(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(current) => current.saturating_mul(2),
        }
        .min(self.max);
        self.current = Some(next);
        next
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

/// The loop connecting the agent to the remote console while the mode is
/// connected.
///
/// Each tick submits exactly one work unit to the scheduler: read collector
/// state, PUT agent status, then PUT the inventory unless its SHA-256 matches
/// the last successful transmission. The tick blocks on the work's future, so
/// successive ticks never interleave. Transient failures back off
/// exponentially; SourceGone and AgentUnauthorized terminate the loop for the
/// lifetime of the process.
pub struct Dispatcher {
    ctx: DispatcherContext,
    status: Arc<Mutex<ConsoleStatus>>,
    fatal_stopped: Arc<AtomicBool>,
    close_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        ctx: DispatcherContext,
        status: Arc<Mutex<ConsoleStatus>>,
        fatal_stopped: Arc<AtomicBool>,
        close_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ctx,
            status,
            fatal_stopped,
            close_rx,
        }
    }

    pub async fn run(mut self) {
        let settings = self.ctx.settings.clone();
        tracing::info!(
            interval_secs = settings.update_interval.as_secs_f64(),
            "console dispatcher started"
        );

        let mut tick = interval(settings.update_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backoff = Backoff::new(settings.update_interval, settings.max_backoff);
        let mut next_allowed: Option<Instant> = None;
        // Intentionally in-memory: after a restart the first successful tick
        // retransmits the persisted inventory.
        let mut last_hash: Option<String> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = self.close_rx.changed() => break,
            }

            if let Some(at) = next_allowed {
                if Instant::now() < at {
                    tracing::debug!("waiting for backoff to expire");
                    continue;
                }
            }

            let mut future = self.dispatch(last_hash.clone());
            let result = tokio::select! {
                result = future.result() => result,
                _ = self.close_rx.changed() => {
                    future.cancel();
                    break;
                }
            };

            match result {
                Ok(DispatchOutcome::InventorySent { hash }) => {
                    last_hash = Some(hash);
                    self.record_success();
                }
                Ok(DispatchOutcome::InventoryUnchanged) => {
                    // Status went out; any previous error state (and its
                    // backoff) is left untouched.
                }
                Err(err) => {
                    let fatal = is_fatal(&err);
                    self.record_error(&err);
                    if fatal {
                        self.fatal_stopped.store(true, Ordering::SeqCst);
                        tracing::error!(error = %err, "fatal console failure, dispatcher stopped permanently");
                        return;
                    }
                    tracing::warn!(error = %err, "console dispatch failed");
                }
            }

            if self.has_error() {
                next_allowed = Some(Instant::now() + backoff.next());
            } else {
                backoff.reset();
                next_allowed = None;
            }
        }

        self.record_disconnected();
        tracing::info!("console dispatcher stopped");
    }

    /// Submits one tick's work unit. Agent status strictly precedes the
    /// inventory update; a tick transmits both, status only (inventory
    /// unchanged), or nothing.
    fn dispatch(&self, last_hash: Option<String>) -> WorkFuture<DispatchOutcome> {
        let ctx = self.ctx.clone();
        self.ctx.scheduler.submit(move |token| async move {
            let settings = &ctx.settings;

            let state = ctx.collector.status().state;
            let status = if settings.legacy_status_enabled {
                state.legacy_wire_value()
            } else {
                state.wire_value()
            };

            let send_status = ctx.client.update_agent_status(
                settings.agent_id,
                settings.source_id,
                &settings.version,
                status,
                &settings.credential_url,
            );
            tokio::select! {
                _ = token.cancelled() => return Err(WorkError::Canceled),
                result = send_status => result.map_err(|err| WorkError::Failed(err.into()))?,
            }

            let record = tokio::select! {
                _ = token.cancelled() => return Err(WorkError::Canceled),
                result = ctx.store.get_inventory() => {
                    result.map_err(|err| WorkError::Failed(err.into()))?
                }
            };

            let hash = format!("{:x}", Sha256::digest(&record.data));
            if last_hash.as_deref() == Some(hash.as_str()) {
                tracing::debug!(hash = %hash, "inventory unchanged, skipping source update");
                return Ok(DispatchOutcome::InventoryUnchanged);
            }

            let inventory: serde_json::Value = serde_json::from_slice(&record.data)
                .map_err(|err| WorkError::Failed(err.into()))?;

            let send_inventory =
                ctx.client
                    .update_source_status(settings.source_id, settings.agent_id, inventory);
            tokio::select! {
                _ = token.cancelled() => return Err(WorkError::Canceled),
                result = send_inventory => result.map_err(|err| WorkError::Failed(err.into()))?,
            }

            // Committed only after a successful transmission so a failed PUT
            // is retried on the next tick.
            Ok(DispatchOutcome::InventorySent { hash })
        })
    }

    fn record_success(&self) {
        let mut status = lock(&self.status);
        status.current = ConnectionState::Connected;
        status.error = None;
    }

    fn record_error(&self, err: &WorkError) {
        let mut status = lock(&self.status);
        status.current = ConnectionState::Error;
        status.error = Some(err.to_string());
    }

    fn record_disconnected(&self) {
        lock(&self.status).current = ConnectionState::Disconnected;
    }

    fn has_error(&self) -> bool {
        lock(&self.status).error.is_some()
    }
}

fn lock(status: &Arc<Mutex<ConsoleStatus>>) -> std::sync::MutexGuard<'_, ConsoleStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_fatal(err: &WorkError) -> bool {
    match err {
        WorkError::Failed(inner) => inner
            .downcast_ref::<ConsoleError>()
            .map(ConsoleError::is_fatal)
            .unwrap_or(false),
        _ => false,
    }
}
