use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::domain::types::{SessionEvent, StreamEvent};
use crate::error::StreamError;
use crate::infra::connections::{ConnectionGuard, ConnectionId, ConnectionMeta, ConnectionRegistry};
use crate::infra::events::EventHub;

/// One client's view of the event stream.
///
/// Pull-based: the transport calls [`EventStreamSession::next`] whenever it can
/// accept more bytes, so a slow socket simply stops pulling. The session owns
/// its hub subscription and registry entry; dropping it releases both.
pub struct EventStreamSession {
    guard: ConnectionGuard,
    receiver: broadcast::Receiver<StreamEvent>,
    next_id: u64,
    greeted: bool,
}

impl EventStreamSession {
    /// Subscribe to `hub` and register with `registry`. The connection is
    /// cancelled when `shutdown` is, or when the session is dropped.
    pub fn open(
        hub: &EventHub,
        registry: &ConnectionRegistry,
        shutdown: &CancellationToken,
        meta: ConnectionMeta,
    ) -> Self {
        let receiver = hub.subscribe();
        let guard = registry.register(meta, shutdown.child_token());
        Self {
            guard,
            receiver,
            next_id: 1,
            greeted: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    /// Next event for this connection.
    ///
    /// `Ok(None)` is a clean end of stream (cancelled, or the hub went away);
    /// `Err` means events were lost and the stream must be closed.
    pub async fn next(&mut self) -> Result<Option<SessionEvent>, StreamError> {
        if self.guard.token().is_cancelled() {
            return Ok(None);
        }

        if !self.greeted {
            self.greeted = true;
            let data = serde_json::json!({ "connection": self.guard.id().to_string() });
            return Ok(Some(self.sequence(StreamEvent::named("connected", data.to_string()))));
        }

        let token = self.guard.token().clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Ok(None),
            received = self.receiver.recv() => match received {
                Ok(event) => Ok(Some(self.sequence(event))),
                Err(RecvError::Closed) => Ok(None),
                Err(RecvError::Lagged(missed)) => Err(StreamError::Lagged(missed)),
            },
        }
    }

    /// End the session from inside its task. Idempotent.
    pub fn close(&self) {
        self.guard.close();
    }

    fn sequence(&mut self, event: StreamEvent) -> SessionEvent {
        let id = self.next_id;
        self.next_id += 1;
        SessionEvent {
            id,
            name: event.name,
            data: event.data,
        }
    }
}
