use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /// Live `/api/stream` connections.
    pub connections: usize,
    /// Of those, how many reconnected with a `Last-Event-ID`.
    pub resumed_connections: usize,
    pub oldest_connection_secs: u64,
}

// ── GET /api/status ───────────────────────────────────────────────────────────

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.connections.stats(Utc::now());
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        connections: stats.live,
        resumed_connections: stats.resumed,
        oldest_connection_secs: stats.oldest_age_secs,
    })
}

// ── GET /healthz ──────────────────────────────────────────────────────────────

/// Live until shutdown begins; a draining instance answers 503 so balancers
/// stop sending it new streams.
pub async fn healthz(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.is_cancelled() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

// ── GET /readyz ───────────────────────────────────────────────────────────────

/// Ready once the database answers a ping.
pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    match state.db.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "database ping failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
