#![allow(async_fn_in_trait)]

use uuid::Uuid;

use crate::domain::types::{CeremonyStart, Challenge, PasskeyRecord, SiteUser};
use crate::error::SiteError;

/// Lookup and creation of site accounts.
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<SiteUser>, SiteError>;

    /// Insert the user unless one with the same username exists. Returns the stored row.
    async fn create(&self, user: &SiteUser) -> Result<SiteUser, SiteError>;
}

/// Repository for WebAuthn passkey credentials.
pub trait PasskeyRepository: Send + Sync {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PasskeyRecord>, SiteError>;

    async fn create(&self, record: &PasskeyRecord) -> Result<(), SiteError>;

    /// Replace an existing passkey credential (used to update counter after authentication).
    async fn update_credential(
        &self,
        credential_id: &[u8],
        credential: &[u8],
    ) -> Result<(), SiteError>;
}

/// Short-lived storage for issued challenges.
///
/// `take` must be atomic: for any id, at most one caller ever receives `Some`.
pub trait ChallengeStore: Send + Sync {
    async fn put(&self, challenge: &Challenge) -> Result<(), SiteError>;

    async fn take(&self, id: Uuid) -> Result<Option<Challenge>, SiteError>;
}

/// WebAuthn cryptography: option generation and response verification.
pub trait PasskeyCeremony: Send + Sync {
    fn start_authentication(&self, passkeys: &[PasskeyRecord]) -> Result<CeremonyStart, SiteError>;

    /// Verify an assertion. Returns the records whose stored credential changed
    /// (counter bumps) so the caller can persist them.
    fn finish_authentication(
        &self,
        state: &[u8],
        response: &serde_json::Value,
        passkeys: &[PasskeyRecord],
    ) -> Result<Vec<PasskeyRecord>, SiteError>;

    fn start_registration(
        &self,
        user: &SiteUser,
        existing: &[PasskeyRecord],
    ) -> Result<CeremonyStart, SiteError>;

    /// Verify an attestation and build the record to store.
    fn finish_registration(
        &self,
        user: &SiteUser,
        state: &[u8],
        response: &serde_json::Value,
    ) -> Result<PasskeyRecord, SiteError>;
}
