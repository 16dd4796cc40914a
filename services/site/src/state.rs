use std::time::Instant;

use chrono::Duration;
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use crate::infra::challenge_store::ChallengeBackend;
use crate::infra::connections::ConnectionRegistry;
use crate::infra::db::{DbPasskeyRepository, DbUserRepository};
use crate::infra::events::EventHub;
use crate::infra::webauthn::WebauthnCeremony;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub challenges: ChallengeBackend,
    pub ceremony: WebauthnCeremony,
    pub hub: EventHub,
    pub connections: ConnectionRegistry,
    /// Cancelled on process shutdown; every stream connection holds a child token.
    pub shutdown: CancellationToken,
    pub session_secret: String,
    pub cookie_secure: bool,
    pub allow_registration: bool,
    pub challenge_ttl: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn passkey_repo(&self) -> DbPasskeyRepository {
        DbPasskeyRepository {
            db: self.db.clone(),
        }
    }
}
