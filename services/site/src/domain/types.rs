use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Site account as seen by the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUser {
    pub id: Uuid,
    pub username: String,
}

/// Stored WebAuthn passkey credential.
#[derive(Debug, Clone)]
pub struct PasskeyRecord {
    pub credential_id: Vec<u8>,
    pub user_id: Uuid,
    /// JSON-serialized `webauthn_rs::Passkey` (with counter).
    pub credential: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Which WebAuthn ceremony a challenge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ceremony {
    Registration,
    Authentication,
}

/// A single-use challenge issued to a username.
///
/// The store holds a challenge while it is `issued`; taking it out of the store
/// is the transition to `consumed`, so it can never be verified twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Server-issued handle the client echoes back on the finish step.
    pub id: Uuid,
    pub ceremony: Ceremony,
    pub user_id: Uuid,
    pub username: String,
    /// Raw challenge bytes the authenticator signs.
    pub challenge: Vec<u8>,
    /// Serialized ceremony state needed to verify the response.
    pub state: Vec<u8>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Remaining lifetime in whole seconds, at least 1 so stores never write a zero TTL.
    pub fn ttl_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }
}

/// Output of starting a ceremony: client options plus server-side state.
#[derive(Debug, Clone)]
pub struct CeremonyStart {
    /// JSON options handed to `navigator.credentials.{get,create}`.
    pub options: serde_json::Value,
    pub challenge: Vec<u8>,
    pub state: Vec<u8>,
}

/// Upstream event shared read-only by every stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub name: Option<String>,
    pub data: String,
}

impl StreamEvent {
    pub fn named(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            data: data.into(),
        }
    }

    pub fn message(data: impl Into<String>) -> Self {
        Self {
            name: None,
            data: data.into(),
        }
    }
}

/// An event as delivered on one connection, numbered for `Last-Event-ID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub id: u64,
    pub name: Option<String>,
    pub data: String,
}

/// Challenge lifetime upper bound in seconds.
pub const MAX_CHALLENGE_TTL_SECS: i64 = 120;

/// Challenge length in bytes.
pub const CHALLENGE_LEN: usize = 32;

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 64;

/// Session token lifetime in seconds (7 days).
pub const SESSION_TTL_SECS: i64 = 604_800;

/// Clamp a configured TTL into `1..=MAX_CHALLENGE_TTL_SECS`.
pub fn challenge_ttl(configured_secs: i64) -> Duration {
    Duration::seconds(configured_secs.clamp(1, MAX_CHALLENGE_TTL_SECS))
}

/// Trim and validate a username from a request body.
pub fn normalize_username(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_USERNAME_LEN {
        return None;
    }
    if name.chars().any(char::is_control) {
        return None;
    }
    Some(name.to_owned())
}
