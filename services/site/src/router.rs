use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use inkwell_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    status::{healthz, readyz, status},
    stream::event_stream,
    webauthn::{current_session, login_finish, login_start, register_finish, register_start},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/status", get(status))
        // Event stream
        .route("/api/stream", get(event_stream))
        // WebAuthn login
        .route("/api/webauthn/login-start", post(login_start))
        .route("/api/webauthn/login-finish", post(login_finish))
        // WebAuthn registration
        .route("/api/webauthn/register-start", post(register_start))
        .route("/api/webauthn/register-finish", post(register_finish))
        // Session
        .route("/api/session", get(current_session))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
