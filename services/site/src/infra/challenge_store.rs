use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use deadpool_redis::Pool;
use deadpool_redis::redis::AsyncCommands;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::repository::ChallengeStore;
use crate::domain::types::Challenge;
use crate::error::SiteError;

// ── In-process store ──────────────────────────────────────────────────────────

/// Challenge store backed by a sharded concurrent map.
///
/// `take` is a single `DashMap::remove`, which holds the shard lock for the
/// lookup and the removal, so two racing takers cannot both get the entry.
#[derive(Clone, Default)]
pub struct MemoryChallengeStore {
    entries: Arc<DashMap<Uuid, Challenge>>,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every challenge that expired at or before `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, c| !c.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Periodically purge expired challenges until `shutdown` is cancelled.
    pub fn spawn_janitor(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let purged = store.purge_expired(Utc::now());
                        if purged > 0 {
                            debug!(purged, "purged expired challenges");
                        }
                    }
                }
            }
        })
    }
}

impl ChallengeStore for MemoryChallengeStore {
    async fn put(&self, challenge: &Challenge) -> Result<(), SiteError> {
        self.entries.insert(challenge.id, challenge.clone());
        Ok(())
    }

    async fn take(&self, id: Uuid) -> Result<Option<Challenge>, SiteError> {
        Ok(self.entries.remove(&id).map(|(_, c)| c))
    }
}

// ── Redis store ───────────────────────────────────────────────────────────────

/// Challenge store in Redis. Expiry is enforced by `SET EX`, consumption by `GETDEL`.
#[derive(Clone)]
pub struct RedisChallengeStore {
    pub pool: Pool,
}

fn challenge_key(id: Uuid) -> String {
    format!("webauthn_challenge:{id}")
}

fn encode_challenge(challenge: &Challenge) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec(challenge).context("encode challenge")
}

/// Decode the value `GETDEL` returned. The key is gone either way, so an
/// undecodable entry counts as absent.
fn decode_taken(value: Option<Vec<u8>>) -> Option<Challenge> {
    let bytes = value?;
    match serde_json::from_slice(&bytes) {
        Ok(challenge) => Some(challenge),
        Err(e) => {
            warn!(error = %e, "discarding undecodable challenge");
            None
        }
    }
}

impl ChallengeStore for RedisChallengeStore {
    async fn put(&self, challenge: &Challenge) -> Result<(), SiteError> {
        let mut conn = self.pool.get().await.context("redis pool")?;
        let payload = encode_challenge(challenge)?;
        let ttl = challenge.ttl_secs(Utc::now());
        let (): () = conn
            .set_ex(challenge_key(challenge.id), payload, ttl)
            .await
            .context("store challenge")?;
        Ok(())
    }

    async fn take(&self, id: Uuid) -> Result<Option<Challenge>, SiteError> {
        let mut conn = self.pool.get().await.context("redis pool")?;
        let value: Option<Vec<u8>> = conn
            .get_del(challenge_key(id))
            .await
            .context("take challenge")?;
        Ok(decode_taken(value))
    }
}

// ── Backend selection ─────────────────────────────────────────────────────────

/// The store configured for this process.
#[derive(Clone)]
pub enum ChallengeBackend {
    Memory(MemoryChallengeStore),
    Redis(RedisChallengeStore),
}

impl ChallengeStore for ChallengeBackend {
    async fn put(&self, challenge: &Challenge) -> Result<(), SiteError> {
        match self {
            Self::Memory(store) => store.put(challenge).await,
            Self::Redis(store) => store.put(challenge).await,
        }
    }

    async fn take(&self, id: Uuid) -> Result<Option<Challenge>, SiteError> {
        match self {
            Self::Memory(store) => store.take(id).await,
            Self::Redis(store) => store.take(id).await,
        }
    }
}
