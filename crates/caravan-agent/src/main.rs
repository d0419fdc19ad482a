use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use caravan_collector::{CollectorEngine, VSphereSource};
use caravan_console::ConsoleClient;
use caravan_scheduler::Scheduler;
use caravan_storage::Store;
use chrono::Utc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use caravan_agent::api;
use caravan_agent::config::AgentConfig;
use caravan_agent::dispatcher::{DispatcherContext, DispatcherSettings};
use caravan_agent::mode::ModeController;
use caravan_agent::state::AppState;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("caravan=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());
    let config = AgentConfig::load(&config_path)?;

    tracing::info!(
        agent_id = %config.agent_id,
        source_id = %config.source_id,
        data_dir = %config.data_dir,
        "caravan-agent starting"
    );

    // Build components, leaves first.
    let store = Arc::new(Store::new(Path::new(&config.data_dir)).await?);
    let scheduler = Arc::new(Scheduler::new(config.workers));

    let token = config.resolve_auth_token()?;
    let client = Arc::new(ConsoleClient::new(&config.console.base_url, token)?);

    let source = Arc::new(VSphereSource::new(
        Duration::from_secs(config.vcenter.connect_timeout_secs),
        config.vcenter.accept_invalid_certs,
    )?);
    let collector = Arc::new(CollectorEngine::new(scheduler.clone(), store.clone(), source).await?);

    let settings = DispatcherSettings {
        agent_id: config.agent_uuid()?,
        source_id: config.source_uuid()?,
        version: env!("CARGO_PKG_VERSION").to_string(),
        credential_url: config.console.credential_url.clone(),
        update_interval: Duration::from_secs(config.update_interval_secs),
        max_backoff: MAX_BACKOFF,
        legacy_status_enabled: config.legacy_status_enabled,
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
        config.default_agent_mode(),
    ));
    mode.startup().await?;

    let state = AppState {
        store,
        collector,
        mode,
        start_time: Utc::now(),
    };
    let app = api::build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(http = %addr, "agent API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("shutting down gracefully");
        })
        .await?;

    scheduler.close().await;
    tracing::info!("agent stopped");
    Ok(())
}
