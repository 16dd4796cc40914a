use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use tracing::{debug, info, warn};

use crate::domain::types::SessionEvent;
use crate::infra::connections::ConnectionMeta;
use crate::state::AppState;
use crate::usecase::stream::EventStreamSession;

const KEEP_ALIVE_SECS: u64 = 15;

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Map a session event onto SSE framing (`event:`, `id:`, `data:`).
pub fn to_sse_event(event: SessionEvent) -> Event {
    let frame = Event::default().id(event.id.to_string()).data(event.data);
    match event.name {
        Some(name) => frame.event(name),
        None => frame,
    }
}

// ── GET /api/stream ───────────────────────────────────────────────────────────

pub async fn event_stream(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let meta = ConnectionMeta {
        user_agent: header_string(&headers, header::USER_AGENT.as_str()),
        last_event_id: header_string(&headers, "last-event-id"),
    };
    if let Some(last) = &meta.last_event_id {
        // Events are not persisted; a reconnecting client starts a fresh sequence.
        debug!(last_event_id = %last, "client resumed, no replay available");
    }

    let user_agent = meta.user_agent.clone().unwrap_or_default();
    let mut session =
        EventStreamSession::open(&state.hub, &state.connections, &state.shutdown, meta);
    let connection_id = session.id();
    info!(
        connection_id = %connection_id,
        user_agent = %user_agent,
        live = state.connections.len(),
        "stream opened"
    );

    // Dropping this stream (client gone) drops the session, which cancels and unregisters it.
    let body = stream! {
        loop {
            match session.next().await {
                Ok(Some(event)) => yield Ok::<Event, Infallible>(to_sse_event(event)),
                Ok(None) => break,
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "closing stream after producer failure");
                    break;
                }
            }
        }
        session.close();
        debug!(connection_id = %connection_id, "stream finished");
    };

    let sse = Sse::new(body).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("ping"),
    );

    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            (
                header::HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        sse,
    )
}
