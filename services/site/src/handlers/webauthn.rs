use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use inkwell_core::serde::{from_unix_secs, to_rfc3339_ms};

use crate::error::SiteError;
use crate::state::AppState;
use crate::usecase::login::{FinishLoginUseCase, StartLoginUseCase};
use crate::usecase::registration::{FinishRegistrationUseCase, StartRegistrationUseCase};
use crate::usecase::session::{issue_session_token, session_from_jar, set_session_cookie};

/// Unwrap a JSON body, turning axum's rejection into our 400 body.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, SiteError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        SiteError::InvalidInput
    })
}

#[derive(Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

// ── POST /api/webauthn/login-start ────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStartResponse {
    pub login_id: Uuid,
    /// Base64url (no padding) challenge bytes.
    pub challenge: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
    /// `publicKey` (rpId, allowCredentials, ...) and `mediation` from the relying party.
    #[serde(flatten)]
    pub options: serde_json::Value,
}

pub async fn login_start(
    State(state): State<AppState>,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> Result<Json<LoginStartResponse>, SiteError> {
    let body = json_body(payload)?;
    let usecase = StartLoginUseCase {
        users: state.user_repo(),
        passkeys: state.passkey_repo(),
        challenges: state.challenges.clone(),
        ceremony: state.ceremony.clone(),
        ttl: state.challenge_ttl,
    };
    let out = usecase.execute(&body.username).await?;

    Ok(Json(LoginStartResponse {
        login_id: out.login_id,
        challenge: URL_SAFE_NO_PAD.encode(&out.challenge),
        expires_at: out.expires_at,
        options: out.options,
    }))
}

// ── POST /api/webauthn/login-finish ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginFinishRequest {
    pub login_id: Uuid,
    pub credential: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
}

pub async fn login_finish(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginFinishRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SiteError> {
    let body = json_body(payload)?;
    let usecase = FinishLoginUseCase {
        users: state.user_repo(),
        passkeys: state.passkey_repo(),
        challenges: state.challenges.clone(),
        ceremony: state.ceremony.clone(),
    };
    let user = usecase.execute(body.login_id, &body.credential).await?;

    let (token, exp) = issue_session_token(&user, &state.session_secret)?;
    let jar = set_session_cookie(jar, token.clone(), state.cookie_secure);

    Ok((
        StatusCode::OK,
        jar,
        Json(SessionResponse {
            username: user.username,
            token: Some(token),
            expires_at: from_unix_secs(exp),
        }),
    ))
}

// ── POST /api/webauthn/register-start ─────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStartResponse {
    pub registration_id: Uuid,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub options: serde_json::Value,
}

pub async fn register_start(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> Result<Json<RegisterStartResponse>, SiteError> {
    let body = json_body(payload)?;
    let session = session_from_jar(&jar, &state.session_secret);
    let usecase = StartRegistrationUseCase {
        users: state.user_repo(),
        passkeys: state.passkey_repo(),
        challenges: state.challenges.clone(),
        ceremony: state.ceremony.clone(),
        ttl: state.challenge_ttl,
        open: state.allow_registration,
    };
    let out = usecase
        .execute(&body.username, session.as_ref().map(|s| s.name.as_str()))
        .await?;

    Ok(Json(RegisterStartResponse {
        registration_id: out.registration_id,
        expires_at: out.expires_at,
        options: out.options,
    }))
}

// ── POST /api/webauthn/register-finish ────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFinishRequest {
    pub registration_id: Uuid,
    pub credential: serde_json::Value,
}

pub async fn register_finish(
    State(state): State<AppState>,
    payload: Result<Json<RegisterFinishRequest>, JsonRejection>,
) -> Result<StatusCode, SiteError> {
    let body = json_body(payload)?;
    let usecase = FinishRegistrationUseCase {
        users: state.user_repo(),
        passkeys: state.passkey_repo(),
        challenges: state.challenges.clone(),
        ceremony: state.ceremony.clone(),
    };
    usecase
        .execute(body.registration_id, &body.credential)
        .await?;
    Ok(StatusCode::CREATED)
}

// ── GET /api/session ──────────────────────────────────────────────────────────

pub async fn current_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SessionResponse>, SiteError> {
    let claims = session_from_jar(&jar, &state.session_secret).ok_or(SiteError::Unauthenticated)?;
    Ok(Json(SessionResponse {
        username: claims.name,
        token: None,
        expires_at: from_unix_secs(claims.exp),
    }))
}
