use std::sync::Arc;

use anyhow::Context as _;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use url::Url;
use webauthn_rs::prelude::*;

use crate::domain::repository::PasskeyCeremony;
use crate::domain::types::{CeremonyStart, PasskeyRecord, SiteUser};
use crate::error::SiteError;

/// `PasskeyCeremony` backed by `webauthn-rs`.
#[derive(Clone)]
pub struct WebauthnCeremony {
    pub webauthn: Arc<Webauthn>,
}

impl WebauthnCeremony {
    pub fn build(rp_id: &str, origin: &str, rp_name: &str) -> anyhow::Result<Self> {
        let rp_origin = Url::parse(origin).context("invalid WEBAUTHN_ORIGIN")?;
        let webauthn = WebauthnBuilder::new(rp_id, &rp_origin)
            .context("invalid WebAuthn configuration")?
            .rp_name(rp_name)
            .build()
            .context("failed to build Webauthn")?;
        Ok(Self {
            webauthn: Arc::new(webauthn),
        })
    }
}

/// Pull the raw challenge out of serialized `{ "publicKey": { "challenge": b64url } }` options.
pub fn challenge_from_options(options: &serde_json::Value) -> Result<Vec<u8>, SiteError> {
    let encoded = options
        .pointer("/publicKey/challenge")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| SiteError::Internal(anyhow::anyhow!("options carry no challenge")))?;
    URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .context("decode challenge")
        .map_err(SiteError::from)
}

fn decode_passkeys(records: &[PasskeyRecord]) -> Vec<(Passkey, &PasskeyRecord)> {
    records
        .iter()
        .filter_map(|r| match serde_json::from_slice::<Passkey>(&r.credential) {
            Ok(pk) => Some((pk, r)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable passkey");
                None
            }
        })
        .collect()
}

fn started<T: serde::Serialize, S: serde::Serialize>(
    options: &T,
    state: &S,
) -> Result<CeremonyStart, SiteError> {
    let options = serde_json::to_value(options).context("encode options")?;
    let challenge = challenge_from_options(&options)?;
    let state = serde_json::to_vec(state).context("encode ceremony state")?;
    Ok(CeremonyStart {
        options,
        challenge,
        state,
    })
}

impl PasskeyCeremony for WebauthnCeremony {
    fn start_authentication(&self, passkeys: &[PasskeyRecord]) -> Result<CeremonyStart, SiteError> {
        let decoded: Vec<Passkey> = decode_passkeys(passkeys)
            .into_iter()
            .map(|(pk, _)| pk)
            .collect();
        if decoded.is_empty() {
            return Err(SiteError::AccountNotFound);
        }
        let (rcr, auth_state) = self
            .webauthn
            .start_passkey_authentication(&decoded)
            .map_err(|e| SiteError::Internal(anyhow::anyhow!("{e}")))?;
        started(&rcr, &auth_state)
    }

    fn finish_authentication(
        &self,
        state: &[u8],
        response: &serde_json::Value,
        passkeys: &[PasskeyRecord],
    ) -> Result<Vec<PasskeyRecord>, SiteError> {
        let auth_state: PasskeyAuthentication =
            serde_json::from_slice(state).map_err(|_| SiteError::AuthenticationFailed)?;
        let credential: PublicKeyCredential =
            serde_json::from_value(response.clone()).map_err(|_| SiteError::InvalidInput)?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&credential, &auth_state)
            .map_err(|e| {
                tracing::debug!(error = %e, "assertion rejected");
                SiteError::AuthenticationFailed
            })?;

        let mut changed = Vec::new();
        for (mut pk, record) in decode_passkeys(passkeys) {
            if pk.update_credential(&result) == Some(true) {
                let credential = serde_json::to_vec(&pk).context("encode passkey")?;
                changed.push(PasskeyRecord {
                    credential,
                    ..record.clone()
                });
            }
        }
        Ok(changed)
    }

    fn start_registration(
        &self,
        user: &SiteUser,
        existing: &[PasskeyRecord],
    ) -> Result<CeremonyStart, SiteError> {
        let exclude: Option<Vec<CredentialID>> = if existing.is_empty() {
            None
        } else {
            Some(
                existing
                    .iter()
                    .map(|r| CredentialID::from(r.credential_id.clone()))
                    .collect(),
            )
        };
        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(user.id, &user.username, &user.username, exclude)
            .map_err(|e| SiteError::Internal(anyhow::anyhow!("{e}")))?;
        started(&ccr, &reg_state)
    }

    fn finish_registration(
        &self,
        user: &SiteUser,
        state: &[u8],
        response: &serde_json::Value,
    ) -> Result<PasskeyRecord, SiteError> {
        let reg_state: PasskeyRegistration =
            serde_json::from_slice(state).map_err(|_| SiteError::AuthenticationFailed)?;
        let credential: RegisterPublicKeyCredential =
            serde_json::from_value(response.clone()).map_err(|_| SiteError::InvalidInput)?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&credential, &reg_state)
            .map_err(|e| {
                tracing::debug!(error = %e, "attestation rejected");
                SiteError::AuthenticationFailed
            })?;

        Ok(PasskeyRecord {
            credential_id: passkey.cred_id().to_vec(),
            user_id: user.id,
            credential: serde_json::to_vec(&passkey).context("encode passkey")?,
            created_at: Utc::now(),
        })
    }
}
