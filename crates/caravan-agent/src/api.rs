use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use caravan_collector::{CollectorError, VCenterCredentials};
use caravan_common::types::{AgentMode, ConsoleStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::logging;
use crate::mode::ModeError;
use crate::state::AppState;

#[derive(Serialize)]
struct ApiError {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct AgentResponse {
    status: ConsoleStatus,
    mode: AgentMode,
}

/// GET /agent — console status plus the effective mode.
async fn get_agent(State(state): State<AppState>) -> Response {
    let mode = match state.mode.mode().await {
        Ok(mode) => mode,
        Err(err) => {
            tracing::error!(error = %err, "failed to read agent mode");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read agent mode");
        }
    };
    Json(AgentResponse {
        status: state.mode.console_status(),
        mode,
    })
    .into_response()
}

#[derive(Deserialize)]
struct SetModeRequest {
    mode: AgentMode,
}

/// POST /agent — change the operating mode. 409 when the dispatcher was
/// fatally stopped.
async fn set_agent_mode(
    State(state): State<AppState>,
    Json(request): Json<SetModeRequest>,
) -> Response {
    match state.mode.set_mode(request.mode).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(ModeError::Conflict) => error_response(
            StatusCode::CONFLICT,
            "cannot reconnect after a fatal console failure",
        ),
        Err(err) => {
            tracing::error!(error = %err, "failed to change agent mode");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to change agent mode")
        }
    }
}

/// GET /collector — collector state snapshot.
async fn get_collector(State(state): State<AppState>) -> Response {
    Json(state.collector.status()).into_response()
}

/// POST /collector — start a collection run with the submitted credentials.
/// 409 while a run is in flight.
async fn start_collector(
    State(state): State<AppState>,
    Json(credentials): Json<VCenterCredentials>,
) -> Response {
    match state.collector.start(credentials) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(CollectorError::CollectionInProgress) => {
            error_response(StatusCode::CONFLICT, "collection already in progress")
        }
    }
}

/// DELETE /collector — stop an in-flight run or clear an error state.
async fn stop_collector(State(state): State<AppState>) -> Response {
    state.collector.stop();
    StatusCode::NO_CONTENT.into_response()
}

/// GET /inventory — the collected inventory blob. 404 until a collection has
/// completed.
async fn get_inventory(State(state): State<AppState>) -> Response {
    match state.store.get_inventory().await {
        Ok(record) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            record.data,
        )
            .into_response(),
        Err(err) if err.is_not_found() => {
            error_response(StatusCode::NOT_FOUND, "no inventory collected yet")
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to read inventory");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read inventory")
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
}

async fn health(State(state): State<AppState>) -> Response {
    Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
    })
    .into_response()
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/agent", get(get_agent).post(set_agent_mode))
        .route(
            "/collector",
            get(get_collector)
                .post(start_collector)
                .delete(stop_collector),
        )
        .route("/inventory", get(get_inventory))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
