use std::time::{SystemTime, UNIX_EPOCH};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::types::{SESSION_TTL_SECS, SiteUser};
use crate::error::SiteError;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "inkwell_session";

/// JWT claims of a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub name: String,
    pub exp: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Sign a session token for `user`. Returns the token and its expiry (epoch seconds).
pub fn issue_session_token(user: &SiteUser, secret: &str) -> Result<(String, u64), SiteError> {
    let exp = now_secs() + SESSION_TTL_SECS as u64;
    let claims = SessionClaims {
        sub: user.id.to_string(),
        name: user.username.clone(),
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| SiteError::Internal(e.into()))?;
    Ok((token, exp))
}

pub fn validate_session_token(token: &str, secret: &str) -> Result<SessionClaims, SiteError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| SiteError::Unauthenticated)?;
    Ok(data.claims)
}

/// Claims of the session cookie in `jar`, if present and valid.
pub fn session_from_jar(jar: &CookieJar, secret: &str) -> Option<SessionClaims> {
    let cookie = jar.get(SESSION_COOKIE)?;
    validate_session_token(cookie.value(), secret).ok()
}

pub fn set_session_cookie(jar: CookieJar, token: String, secure: bool) -> CookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}
