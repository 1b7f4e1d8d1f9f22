use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use tollgate_domain::contact::ContactError;

/// Auth service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("too many requests, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("user not found")]
    UserNotFound,
    #[error("invalid or expired otp")]
    InvalidOtp,
    #[error("invalid passkey")]
    InvalidPasskey,
    #[error("invalid token")]
    InvalidToken,
    #[error("refresh token not found or revoked")]
    InvalidRefreshToken,
    #[error("account is not active")]
    AccountInactive,
    #[error("passkey not set, please use otp login first")]
    PasskeyNotSet,
    #[error("email already in use")]
    EmailInUse,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidOtp => "INVALID_OTP",
            Self::InvalidPasskey => "INVALID_PASSKEY",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::PasskeyNotSet => "PASSKEY_NOT_SET",
            Self::EmailInUse => "EMAIL_IN_USE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<ContactError> for AuthServiceError {
    fn from(e: ContactError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for AuthServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::PasskeyNotSet => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::InvalidOtp
            | Self::InvalidPasskey
            | Self::InvalidToken
            | Self::InvalidRefreshToken
            | Self::AccountInactive => StatusCode::UNAUTHORIZED,
            Self::EmailInUse => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // 4xx are already visible through TraceLayer; only 500s carry a chain worth logging.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL", "internal error");
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::RateLimited { retry_after_secs } = self {
            body["retryAfter"] = retry_after_secs.into();
            let mut resp = (status, axum::Json(body)).into_response();
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            return resp;
        }
        (status, axum::Json(body)).into_response()
    }
}
