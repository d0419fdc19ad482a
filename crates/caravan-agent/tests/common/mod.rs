#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use caravan_agent::dispatcher::{DispatcherContext, DispatcherSettings};
use caravan_agent::mode::ModeController;
use caravan_agent::state::AppState;
use caravan_collector::{CollectorEngine, InventorySource, SourceError, VCenterCredentials};
use caravan_common::types::AgentMode;
use caravan_console::ConsoleClient;
use caravan_scheduler::Scheduler;
use caravan_storage::Store;
use chrono::Utc;
use tempfile::TempDir;
use tokio::time::sleep;
use uuid::Uuid;

/// Scripted remote console: configurable response codes, recorded requests.
pub struct MockConsole {
    pub agent_status_code: AtomicU16,
    pub source_status_code: AtomicU16,
    pub agent_requests: Mutex<Vec<serde_json::Value>>,
    pub source_requests: Mutex<Vec<serde_json::Value>>,
    /// Arrival order across both endpoints: "agent" / "source".
    pub events: Mutex<Vec<&'static str>>,
}

impl MockConsole {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            agent_status_code: AtomicU16::new(200),
            source_status_code: AtomicU16::new(200),
            agent_requests: Mutex::new(Vec::new()),
            source_requests: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn agent_calls(&self) -> usize {
        self.agent_requests.lock().expect("lock").len()
    }

    pub fn source_calls(&self) -> usize {
        self.source_requests.lock().expect("lock").len()
    }

    pub fn set_agent_status(&self, code: u16) {
        self.agent_status_code.store(code, Ordering::SeqCst);
    }

    pub fn set_source_status(&self, code: u16) {
        self.source_status_code.store(code, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().expect("lock").clone()
    }
}

async fn put_agent_status(
    State(console): State<Arc<MockConsole>>,
    Path(_id): Path<Uuid>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    console.events.lock().expect("lock").push("agent");
    console.agent_requests.lock().expect("lock").push(body);
    StatusCode::from_u16(console.agent_status_code.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn put_source_status(
    State(console): State<Arc<MockConsole>>,
    Path(_id): Path<Uuid>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    console.events.lock().expect("lock").push("source");
    console.source_requests.lock().expect("lock").push(body);
    StatusCode::from_u16(console.source_status_code.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn spawn_console() -> (Arc<MockConsole>, String) {
    let console = MockConsole::new();
    let app = Router::new()
        .route("/api/v1/agents/:id/status", put(put_agent_status))
        .route("/api/v1/sources/:id/status", put(put_source_status))
        .with_state(console.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (console, format!("http://{addr}"))
}

/// In-test inventory source: always validates, serves a fixed blob, and can
/// be held in the credential phase to keep a run in flight.
pub struct StubSource {
    pub data: Mutex<Vec<u8>>,
    pub hold_credentials: AtomicBool,
}

impl StubSource {
    pub fn new(data: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data.to_vec()),
            hold_credentials: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl InventorySource for StubSource {
    async fn check_credentials(&self, _credentials: &VCenterCredentials) -> Result<(), SourceError> {
        while self.hold_credentials.load(Ordering::SeqCst) {
            sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    async fn fetch_inventory(
        &self,
        _credentials: &VCenterCredentials,
    ) -> Result<Vec<u8>, SourceError> {
        Ok(self.data.lock().expect("lock").clone())
    }
}

pub struct TestAgent {
    pub temp_dir: TempDir,
    pub store: Arc<Store>,
    pub scheduler: Arc<Scheduler>,
    pub source: Arc<StubSource>,
    pub collector: Arc<CollectorEngine>,
    pub mode: Arc<ModeController>,
    pub console: Arc<MockConsole>,
    pub agent_id: Uuid,
    pub source_id: Uuid,
}

impl TestAgent {
    pub fn app(&self) -> Router {
        caravan_agent::api::build_router(AppState {
            store: self.store.clone(),
            collector: self.collector.clone(),
            mode: self.mode.clone(),
            start_time: Utc::now(),
        })
    }

    pub async fn shutdown(&self) {
        let _ = self.mode.set_mode(AgentMode::Disconnected).await;
        self.scheduler.close().await;
    }
}

/// Builds a full agent wired to a scripted console. Seeds applied before the
/// collector engine is constructed, so a seeded inventory makes the engine
/// start out Collected (the restart scenario).
pub async fn build_agent_with(
    update_interval: Duration,
    seed_mode: Option<AgentMode>,
    seed_inventory: Option<&[u8]>,
) -> TestAgent {
    let temp_dir = TempDir::new().expect("temp dir should create");
    let store = Arc::new(
        Store::new(temp_dir.path())
            .await
            .expect("store should open"),
    );

    if let Some(mode) = seed_mode {
        store
            .save_configuration(mode)
            .await
            .expect("mode seed should save");
    }
    if let Some(data) = seed_inventory {
        store
            .save_inventory(data)
            .await
            .expect("inventory seed should save");
    }

    let scheduler = Arc::new(Scheduler::new(4));
    let (console, base_url) = spawn_console().await;
    let client = Arc::new(
        ConsoleClient::new(&base_url, Some("test-token".to_string()))
            .expect("client should build"),
    );

    let source = StubSource::new(br#"{"vms":{"total":1}}"#);
    let collector = Arc::new(
        CollectorEngine::new(scheduler.clone(), store.clone(), source.clone())
            .await
            .expect("engine should build"),
    );

    let agent_id = Uuid::new_v4();
    let source_id = Uuid::new_v4();
    let settings = DispatcherSettings {
        agent_id,
        source_id,
        version: "0.3.0".to_string(),
        credential_url: "http://localhost:3333".to_string(),
        update_interval,
        max_backoff: update_interval.saturating_mul(8),
        legacy_status_enabled: false,
    };
    let ctx = DispatcherContext {
        scheduler: scheduler.clone(),
        client,
        collector: collector.clone(),
        store: store.clone(),
        settings,
    };

    let mode = Arc::new(ModeController::new(
        store.clone(),
        ctx,
        AgentMode::Disconnected,
    ));

    TestAgent {
        temp_dir,
        store,
        scheduler,
        source,
        collector,
        mode,
        console,
        agent_id,
        source_id,
    }
}

pub async fn build_agent(update_interval: Duration) -> TestAgent {
    build_agent_with(update_interval, None, None).await
}

/// Polls a condition for a few seconds before failing the test.
pub async fn wait_for<F>(condition: F, what: &str)
where
    F: Fn() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
