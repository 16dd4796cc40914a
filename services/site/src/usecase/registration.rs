use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::repository::{ChallengeStore, PasskeyCeremony, PasskeyRepository, UserRepository};
use crate::domain::types::{Ceremony, Challenge, SiteUser, normalize_username};
use crate::error::SiteError;

// ── Start registration ────────────────────────────────────────────────────────

pub struct StartRegistrationOutput {
    pub registration_id: Uuid,
    pub options: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

pub struct StartRegistrationUseCase<U, P, C, K>
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
    /// Open registration for anyone.
    pub open: bool,
}

impl<U, P, C, K> StartRegistrationUseCase<U, P, C, K>
where
    U: UserRepository,
    P: PasskeyRepository,
    C: ChallengeStore,
    K: PasskeyCeremony,
{
    /// `session_username` is the caller's authenticated username, if any.
    ///
    /// Passkeys are only ever added to an existing account by its signed-in owner.
    /// Open registration lets anyone claim a username nobody holds yet.
    pub async fn execute(
        &self,
        username: &str,
        session_username: Option<&str>,
    ) -> Result<StartRegistrationOutput, SiteError> {
        let username = normalize_username(username).ok_or(SiteError::InvalidInput)?;
        let is_owner = session_username == Some(username.as_str());
        if !self.open && !is_owner {
            return Err(SiteError::RegistrationClosed);
        }

        let (user, existing) = match self.users.find_by_username(&username).await? {
            Some(_) if !is_owner => return Err(SiteError::RegistrationClosed),
            Some(user) => {
                let existing = self.passkeys.list_by_user(user.id).await?;
                (user, existing)
            }
            None => (
                SiteUser {
                    id: Uuid::new_v4(),
                    username,
                },
                Vec::new(),
            ),
        };

        let start = self.ceremony.start_registration(&user, &existing)?;

        let now = Utc::now();
        let challenge = Challenge {
            id: Uuid::new_v4(),
            ceremony: Ceremony::Registration,
            user_id: user.id,
            username: user.username,
            challenge: start.challenge,
            state: start.state,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.challenges.put(&challenge).await?;

        Ok(StartRegistrationOutput {
            registration_id: challenge.id,
            options: start.options,
            expires_at: challenge.expires_at,
        })
    }
}

// ── Finish registration ───────────────────────────────────────────────────────

pub struct FinishRegistrationUseCase<U, P, C, K>
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

impl<U, P, C, K> FinishRegistrationUseCase<U, P, C, K>
where
    U: UserRepository,
    P: PasskeyRepository,
    C: ChallengeStore,
    K: PasskeyCeremony,
{
    pub async fn execute(
        &self,
        registration_id: Uuid,
        response: &serde_json::Value,
    ) -> Result<SiteUser, SiteError> {
        let challenge = self
            .challenges
            .take(registration_id)
            .await?
            .ok_or(SiteError::AuthenticationFailed)?;

        if challenge.ceremony != Ceremony::Registration || challenge.is_expired_at(Utc::now()) {
            return Err(SiteError::AuthenticationFailed);
        }

        let pending = SiteUser {
            id: challenge.user_id,
            username: challenge.username.clone(),
        };
        let record = self
            .ceremony
            .finish_registration(&pending, &challenge.state, response)?;

        // Someone else may have claimed the username since the challenge was issued.
        let user = self.users.create(&pending).await?;
        if user.id != pending.id {
            return Err(SiteError::AuthenticationFailed);
        }

        self.passkeys.create(&record).await?;
        tracing::info!(user_id = %user.id, "passkey registered");
        Ok(user)
    }
}
