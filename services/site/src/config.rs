use std::time::Duration;

use serde::Deserialize;

use inkwell_core::config::Config;

use crate::domain::types::{MAX_CHALLENGE_TTL_SECS, challenge_ttl};

/// Site service configuration loaded from environment variables.
#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    /// SQLite connection URL. Env var: `DATABASE_URL`.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Redis URL. Challenges are kept in process memory when unset.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// HMAC secret for signing session tokens.
    pub session_secret: String,
    /// WebAuthn relying-party ID (e.g. "example.com").
    pub webauthn_rp_id: String,
    /// WebAuthn relying-party origin URL (e.g. "https://example.com").
    pub webauthn_origin: String,
    #[serde(default = "default_rp_name")]
    pub webauthn_rp_name: String,
    /// TCP port to listen on (default 3000). Env var: `SITE_PORT`.
    #[serde(default = "default_port")]
    pub site_port: u16,
    /// Whether anyone may register passkeys for a new username.
    #[serde(default)]
    pub allow_registration: bool,
    /// `Secure` attribute on the session cookie. Disable only for plain-http development.
    #[serde(default = "default_true")]
    pub cookie_secure: bool,
    /// Seconds between `tick` events on the stream.
    #[serde(default = "default_tick_secs")]
    pub stream_tick_secs: u64,
    /// Per-subscriber buffer of the event hub; slower clients are disconnected.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: i64,
}

impl Config for SiteConfig {}

impl SiteConfig {
    pub fn challenge_ttl(&self) -> chrono::Duration {
        challenge_ttl(self.challenge_ttl_secs)
    }

    pub fn stream_tick(&self) -> Duration {
        Duration::from_secs(self.stream_tick_secs.max(1))
    }
}

fn default_database_url() -> String {
    "sqlite://inkwell.db?mode=rwc".to_owned()
}

fn default_rp_name() -> String {
    "Inkwell".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_tick_secs() -> u64 {
    1
}

fn default_stream_buffer() -> usize {
    64
}

fn default_challenge_ttl_secs() -> i64 {
    MAX_CHALLENGE_TTL_SECS
}
