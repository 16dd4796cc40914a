use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use inkwell_site::domain::repository::{PasskeyCeremony, PasskeyRepository, UserRepository};
use inkwell_site::domain::types::{CeremonyStart, PasskeyRecord, SiteUser, challenge_ttl};
use inkwell_site::error::SiteError;
use inkwell_site::infra::challenge_store::{ChallengeBackend, MemoryChallengeStore};
use inkwell_site::infra::connections::ConnectionRegistry;
use inkwell_site::infra::events::EventHub;
use inkwell_site::infra::webauthn::WebauthnCeremony;
use inkwell_site::state::AppState;
use inkwell_site_migration::{Migrator, MigratorTrait};

// ── MockUserRepo ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockUserRepo {
    pub users: Arc<Mutex<Vec<SiteUser>>>,
}

impl MockUserRepo {
    pub fn new(users: Vec<SiteUser>) -> Self {
        Self {
            users: Arc::new(Mutex::new(users)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }
}

impl UserRepository for MockUserRepo {
    async fn find_by_username(&self, username: &str) -> Result<Option<SiteUser>, SiteError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: &SiteUser) -> Result<SiteUser, SiteError> {
        let mut users = self.users.lock().unwrap();
        if let Some(existing) = users.iter().find(|u| u.username == user.username) {
            return Ok(existing.clone());
        }
        users.push(user.clone());
        Ok(user.clone())
    }
}

// ── MockPasskeyRepo ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockPasskeyRepo {
    pub records: Arc<Mutex<Vec<PasskeyRecord>>>,
}

impl MockPasskeyRepo {
    pub fn new(records: Vec<PasskeyRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }
}

impl PasskeyRepository for MockPasskeyRepo {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PasskeyRecord>, SiteError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(&self, record: &PasskeyRecord) -> Result<(), SiteError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn update_credential(
        &self,
        credential_id: &[u8],
        credential: &[u8],
    ) -> Result<(), SiteError> {
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.iter_mut().find(|r| r.credential_id == credential_id) {
            r.credential = credential.to_vec();
        }
        Ok(())
    }
}

// ── MockCeremony ─────────────────────────────────────────────────────────────

/// Stand-in for the WebAuthn cryptography.
///
/// The state it hands out is the challenge itself; a response verifies when its
/// `"challenge"` field carries the same bytes. Successful logins bump the
/// credential of every passkey to `b"counter+1"`.
#[derive(Clone, Default)]
pub struct MockCeremony;

impl MockCeremony {
    fn fresh() -> CeremonyStart {
        let challenge: [u8; 32] = rand::random();
        CeremonyStart {
            options: serde_json::json!({
                "publicKey": { "challenge": hex(&challenge), "rpId": "localhost" }
            }),
            challenge: challenge.to_vec(),
            state: challenge.to_vec(),
        }
    }

    fn verify(state: &[u8], response: &serde_json::Value) -> Result<(), SiteError> {
        let echoed = response
            .get("challenge")
            .and_then(serde_json::Value::as_str)
            .ok_or(SiteError::InvalidInput)?;
        if echoed == hex(state) {
            Ok(())
        } else {
            Err(SiteError::AuthenticationFailed)
        }
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// The response a well-behaved authenticator would send for `challenge`.
pub fn signed_response(challenge: &[u8]) -> serde_json::Value {
    serde_json::json!({ "challenge": hex(challenge) })
}

impl PasskeyCeremony for MockCeremony {
    fn start_authentication(&self, passkeys: &[PasskeyRecord]) -> Result<CeremonyStart, SiteError> {
        if passkeys.is_empty() {
            return Err(SiteError::AccountNotFound);
        }
        Ok(Self::fresh())
    }

    fn finish_authentication(
        &self,
        state: &[u8],
        response: &serde_json::Value,
        passkeys: &[PasskeyRecord],
    ) -> Result<Vec<PasskeyRecord>, SiteError> {
        Self::verify(state, response)?;
        Ok(passkeys
            .iter()
            .map(|r| PasskeyRecord {
                credential: b"counter+1".to_vec(),
                ..r.clone()
            })
            .collect())
    }

    fn start_registration(
        &self,
        _user: &SiteUser,
        _existing: &[PasskeyRecord],
    ) -> Result<CeremonyStart, SiteError> {
        Ok(Self::fresh())
    }

    fn finish_registration(
        &self,
        user: &SiteUser,
        state: &[u8],
        response: &serde_json::Value,
    ) -> Result<PasskeyRecord, SiteError> {
        Self::verify(state, response)?;
        Ok(PasskeyRecord {
            credential_id: state[..8].to_vec(),
            user_id: user.id,
            credential: b"fresh".to_vec(),
            created_at: Utc::now(),
        })
    }
}

// ── Test fixture helpers ─────────────────────────────────────────────────────

pub fn alice() -> SiteUser {
    SiteUser {
        id: Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
        username: "alice".to_owned(),
    }
}

pub fn test_passkey_record(user_id: Uuid) -> PasskeyRecord {
    PasskeyRecord {
        credential_id: vec![1, 2, 3, 4],
        user_id,
        credential: b"counter+0".to_vec(),
        created_at: Utc::now(),
    }
}

pub const TEST_SESSION_SECRET: &str = "test-session-secret-for-integration-tests";

/// Fresh in-memory SQLite database with migrations applied.
pub async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Full application state over an in-memory database and challenge store.
pub async fn test_state() -> AppState {
    AppState {
        db: test_db().await,
        challenges: ChallengeBackend::Memory(MemoryChallengeStore::new()),
        ceremony: WebauthnCeremony::build("localhost", "http://localhost:3000", "Inkwell").unwrap(),
        hub: EventHub::new(16),
        connections: ConnectionRegistry::new(),
        shutdown: CancellationToken::new(),
        session_secret: TEST_SESSION_SECRET.to_owned(),
        cookie_secure: false,
        allow_registration: false,
        challenge_ttl: challenge_ttl(120),
        started_at: Instant::now(),
    }
}
