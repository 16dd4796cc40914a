//! Upstream event source for the stream endpoint.
//!
//! A single broadcast channel fans every published event out to all live
//! connections. Subscribers only read; nothing a connection does can alter
//! what another one receives.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use inkwell_core::serde::rfc3339_ms;

use crate::domain::types::StreamEvent;

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<StreamEvent>,
}

impl EventHub {
    /// `capacity` is how many events a subscriber may fall behind before it lags out.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber. Returns how many received it;
    /// with nobody listening the event is dropped.
    pub fn publish(&self, event: StreamEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Build the periodic `tick` event.
pub fn tick_event() -> StreamEvent {
    let now = rfc3339_ms(&Utc::now());
    StreamEvent::named("tick", serde_json::json!({ "now": now }).to_string())
}

/// Publish a `tick` event every `period` until `shutdown` is cancelled.
pub fn spawn_ticker(hub: EventHub, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(period_ms = period.as_millis() as u64, "stream ticker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let delivered = hub.publish(tick_event());
                    debug!(delivered, "tick published");
                }
            }
        }
        info!("stream ticker stopped");
    })
}
