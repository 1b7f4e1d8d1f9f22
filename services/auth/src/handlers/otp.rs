use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::domain::types::ClientMeta;
use crate::error::AuthServiceError;
use crate::handlers::user::UserResponse;
use crate::state::AppState;
use crate::usecase::otp::{SendOtpInput, SendOtpUseCase, VerifyOtpInput, VerifyOtpUseCase};
use crate::usecase::token::LoginOutput;

/// Body returned by every login route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserResponse,
    pub is_new_user: bool,
}

impl From<LoginOutput> for LoginResponse {
    fn from(out: LoginOutput) -> Self {
        Self {
            access_token: out.tokens.access_token,
            refresh_token: out.tokens.refresh_token,
            expires_in: out.tokens.expires_in,
            user: out.user.into(),
            is_new_user: out.is_new_user,
        }
    }
}

// ── POST /auth/otp/send ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub message: &'static str,
    pub expires_in_seconds: i64,
}

pub async fn send_otp(
    State(state): State<AppState>,
    client: ClientMeta,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, AuthServiceError> {
    let usecase = SendOtpUseCase {
        otps: state.otp_store(),
        limiter: state.rate_limiter(),
        audit: state.audit_trail(),
        dispatcher: state.notification_client(),
    };
    let out = usecase
        .execute(
            SendOtpInput {
                phone: body.phone,
                email: body.email,
            },
            &client,
        )
        .await?;
    Ok(Json(SendOtpResponse {
        message: out.message,
        expires_in_seconds: out.expires_in,
    }))
}

// ── POST /auth/otp/verify ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub otp: String,
    pub name: Option<String>,
}

pub async fn verify_otp(
    State(state): State<AppState>,
    client: ClientMeta,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<LoginResponse>, AuthServiceError> {
    let usecase = VerifyOtpUseCase {
        resolver: state.identity_resolver(),
        otps: state.otp_store(),
        issuer: state.token_issuer(),
        limiter: state.rate_limiter(),
        audit: state.audit_trail(),
        notifier: state.identity_client(),
    };
    let out = usecase
        .execute(
            VerifyOtpInput {
                phone: body.phone,
                email: body.email,
                otp: body.otp,
                name: body.name,
            },
            &client,
        )
        .await?;
    Ok(Json(out.into()))
}
