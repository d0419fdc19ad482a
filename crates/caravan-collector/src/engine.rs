use std::sync::{Arc, Mutex};

use caravan_common::types::{CollectorState, CollectorStatus};
use caravan_scheduler::{Scheduler, WorkError};
use caravan_storage::{StorageError, Store};
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;
use crate::source::{InventorySource, VCenterCredentials};

/// State machine driving credential validation and inventory acquisition.
///
/// Ready ──start──▶ Connecting ──ok──▶ Collecting ──ok──▶ Collected (terminal)
/// with failures landing in Error, and stop() re-arming Ready from anything
/// except Collected.
pub struct CollectorEngine {
    scheduler: Arc<Scheduler>,
    store: Arc<Store>,
    source: Arc<dyn InventorySource>,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    status: CollectorStatus,
    cancel: Option<CancellationToken>,
    /// Bumped on every start() and stop(). A driver task only applies
    /// transitions for the generation it was started with, so a canceled run
    /// can never clobber the state of a later one.
    generation: u64,
}

impl CollectorEngine {
    /// Builds the engine. Initial state is Collected when an inventory
    /// snapshot already exists in the store, Ready otherwise.
    pub async fn new(
        scheduler: Arc<Scheduler>,
        store: Arc<Store>,
        source: Arc<dyn InventorySource>,
    ) -> Result<Self, StorageError> {
        let state = match store.get_inventory().await {
            Ok(_) => CollectorState::Collected,
            Err(err) if err.is_not_found() => CollectorState::Ready,
            Err(err) => return Err(err),
        };

        tracing::info!(state = %state, "collector engine initialized");

        Ok(Self {
            scheduler,
            store,
            source,
            inner: Arc::new(Mutex::new(Inner {
                status: CollectorStatus { state, error: None },
                cancel: None,
                generation: 0,
            })),
        })
    }

    /// Snapshot of the current state and last error.
    pub fn status(&self) -> CollectorStatus {
        lock(&self.inner).status.clone()
    }

    /// Starts a collection run.
    ///
    /// Admitted from Ready and Error. Collected is terminal: the call is a
    /// successful no-op. A run that is connecting or collecting rejects
    /// concurrent starts.
    pub fn start(&self, credentials: VCenterCredentials) -> Result<(), CollectorError> {
        let generation = {
            let mut inner = lock(&self.inner);
            match inner.status.state {
                CollectorState::Collected => return Ok(()),
                CollectorState::Connecting | CollectorState::Collecting => {
                    return Err(CollectorError::CollectionInProgress)
                }
                CollectorState::Ready | CollectorState::Error => {}
            }
            inner.status = CollectorStatus {
                state: CollectorState::Connecting,
                error: None,
            };
            inner.generation += 1;
            inner.generation
        };

        tracing::info!(url = %credentials.url, "starting inventory collection");

        let source = self.source.clone();
        let check_credentials = credentials.clone();
        let mut check = self.scheduler.submit(move |token| async move {
            tokio::select! {
                _ = token.cancelled() => Err(WorkError::Canceled),
                result = source.check_credentials(&check_credentials) => {
                    result.map_err(|err| WorkError::Failed(err.into()))
                }
            }
        });
        set_cancel(&self.inner, generation, check.cancellation());

        let scheduler = self.scheduler.clone();
        let store = self.store.clone();
        let source = self.source.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(err) = check.result().await {
                finish_with_error(&inner, generation, err);
                return;
            }
            if !advance(&inner, generation, CollectorState::Collecting) {
                return;
            }

            let fetch_source = source.clone();
            let mut collect = scheduler.submit(move |token| async move {
                tokio::select! {
                    _ = token.cancelled() => Err(WorkError::Canceled),
                    result = fetch_source.fetch_inventory(&credentials) => {
                        result.map_err(|err| WorkError::Failed(err.into()))
                    }
                }
            });
            set_cancel(&inner, generation, collect.cancellation());

            let data = match collect.result().await {
                Ok(data) => data,
                Err(err) => {
                    finish_with_error(&inner, generation, err);
                    return;
                }
            };

            // The snapshot is persisted only on terminal success; no partial
            // inventory ever reaches the store.
            if let Err(err) = store.save_inventory(&data).await {
                finish_with_error(&inner, generation, WorkError::Failed(err.into()));
                return;
            }

            let mut guard = lock(&inner);
            if guard.generation != generation {
                return;
            }
            guard.status = CollectorStatus {
                state: CollectorState::Collected,
                error: None,
            };
            guard.cancel = None;
            tracing::info!(bytes = data.len(), "inventory collection completed");
        });

        Ok(())
    }

    /// Stops an in-flight run or clears an Error state, re-arming start().
    /// A no-op once Collected.
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        match inner.status.state {
            CollectorState::Collected | CollectorState::Ready => {}
            CollectorState::Connecting | CollectorState::Collecting => {
                if let Some(cancel) = inner.cancel.take() {
                    cancel.cancel();
                }
                inner.generation += 1;
                inner.status = CollectorStatus {
                    state: CollectorState::Ready,
                    error: None,
                };
                tracing::info!("inventory collection stopped");
            }
            CollectorState::Error => {
                // The error detail is deliberately discarded.
                inner.generation += 1;
                inner.status = CollectorStatus {
                    state: CollectorState::Ready,
                    error: None,
                };
            }
        }
    }
}

fn lock(inner: &Arc<Mutex<Inner>>) -> std::sync::MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_cancel(inner: &Arc<Mutex<Inner>>, generation: u64, cancel: CancellationToken) {
    let mut guard = lock(inner);
    if guard.generation == generation {
        guard.cancel = Some(cancel);
    }
}

fn advance(inner: &Arc<Mutex<Inner>>, generation: u64, state: CollectorState) -> bool {
    let mut guard = lock(inner);
    if guard.generation != generation {
        return false;
    }
    guard.status.state = state;
    true
}

fn finish_with_error(inner: &Arc<Mutex<Inner>>, generation: u64, err: WorkError) {
    let mut guard = lock(inner);
    if guard.generation != generation {
        return;
    }
    guard.cancel = None;
    if err.is_canceled() {
        // Canceled through the scheduler (e.g. shutdown): back to Ready, the
        // stop() path has its own transition.
        guard.status = CollectorStatus {
            state: CollectorState::Ready,
            error: None,
        };
    } else {
        tracing::error!(error = %err, "inventory collection failed");
        guard.status = CollectorStatus {
            state: CollectorState::Error,
            error: Some(err.to_string()),
        };
    }
}
