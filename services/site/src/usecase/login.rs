use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::repository::{ChallengeStore, PasskeyCeremony, PasskeyRepository, UserRepository};
use crate::domain::types::{Ceremony, Challenge, SiteUser, normalize_username};
use crate::error::SiteError;

// ── Start login ───────────────────────────────────────────────────────────────

pub struct StartLoginOutput {
    pub login_id: Uuid,
    pub challenge: Vec<u8>,
    pub options: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

pub struct StartLoginUseCase<U, P, C, K>
where
    U: UserRepository,
    P: PasskeyRepository,
    C: ChallengeStore,
    K: PasskeyCeremony,
{
    pub users: U,
    pub passkeys: P,
    pub challenges: C,
    pub ceremony: K,
    pub ttl: Duration,
}

impl<U, P, C, K> StartLoginUseCase<U, P, C, K>
where
    U: UserRepository,
    P: PasskeyRepository,
    C: ChallengeStore,
    K: PasskeyCeremony,
{
    /// Unknown users and users without passkeys both yield `AccountNotFound`.
    pub async fn execute(&self, username: &str) -> Result<StartLoginOutput, SiteError> {
        let username = normalize_username(username).ok_or(SiteError::InvalidInput)?;

        let user = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or(SiteError::AccountNotFound)?;

        let stored = self.passkeys.list_by_user(user.id).await?;
        if stored.is_empty() {
            return Err(SiteError::AccountNotFound);
        }

        let start = self.ceremony.start_authentication(&stored)?;

        let now = Utc::now();
        let challenge = Challenge {
            id: Uuid::new_v4(),
            ceremony: Ceremony::Authentication,
            user_id: user.id,
            username: user.username,
            challenge: start.challenge,
            state: start.state,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.challenges.put(&challenge).await?;
        tracing::debug!(login_id = %challenge.id, "login challenge issued");

        Ok(StartLoginOutput {
            login_id: challenge.id,
            challenge: challenge.challenge,
            options: start.options,
            expires_at: challenge.expires_at,
        })
    }
}

// ── Finish login ──────────────────────────────────────────────────────────────

pub struct FinishLoginUseCase<U, P, C, K>
where
    U: UserRepository,
    P: PasskeyRepository,
    C: ChallengeStore,
    K: PasskeyCeremony,
{
    pub users: U,
    pub passkeys: P,
    pub challenges: C,
    pub ceremony: K,
}

impl<U, P, C, K> FinishLoginUseCase<U, P, C, K>
where
    U: UserRepository,
    P: PasskeyRepository,
    C: ChallengeStore,
    K: PasskeyCeremony,
{
    /// Consumes the challenge before verifying, so a failed or replayed attempt
    /// leaves nothing behind to retry against.
    pub async fn execute(
        &self,
        login_id: Uuid,
        response: &serde_json::Value,
    ) -> Result<SiteUser, SiteError> {
        let challenge = self
            .challenges
            .take(login_id)
            .await?
            .ok_or(SiteError::AuthenticationFailed)?;

        if challenge.ceremony != Ceremony::Authentication
            || challenge.is_expired_at(Utc::now())
        {
            return Err(SiteError::AuthenticationFailed);
        }

        let user = self
            .users
            .find_by_username(&challenge.username)
            .await?
            .filter(|u| u.id == challenge.user_id)
            .ok_or(SiteError::AuthenticationFailed)?;

        let stored = self.passkeys.list_by_user(user.id).await?;
        let changed = self
            .ceremony
            .finish_authentication(&challenge.state, response, &stored)?;

        for record in &changed {
            self.passkeys
                .update_credential(&record.credential_id, &record.credential)
                .await?;
        }

        tracing::info!(user_id = %user.id, "passkey login succeeded");
        Ok(user)
    }
}
