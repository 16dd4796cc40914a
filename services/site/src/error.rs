use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Site service error variants.
///
/// `AccountNotFound` covers both "no such user" and "no registered passkey", and
/// `AuthenticationFailed` covers expired, consumed, unknown and unverifiable
/// challenges alike, so callers cannot tell these cases apart.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("invalid input")]
    InvalidInput,
    #[error("account not found")]
    AccountNotFound,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("registration closed")]
    RegistrationClosed,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl SiteError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::RegistrationClosed => "REGISTRATION_CLOSED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::AccountNotFound => StatusCode::NOT_FOUND,
            Self::AuthenticationFailed | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::RegistrationClosed => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        let status = self.status();
        // TraceLayer already records every request; only 500s carry a cause worth logging.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

/// Errors raised while producing events for one stream connection.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The connection fell behind the upstream buffer and missed events.
    #[error("subscriber lagged behind by {0} events")]
    Lagged(u64),
}
