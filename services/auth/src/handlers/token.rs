use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use tollgate_auth_types::identity::AuthenticatedUser;

use crate::domain::types::ClientMeta;
use crate::error::AuthServiceError;
use crate::handlers::passkey::MessageResponse;
use crate::state::AppState;
use crate::usecase::token::{LogoutUseCase, RefreshTokenUseCase};

// ── POST /auth/refresh ────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

pub async fn refresh(
    State(state): State<AppState>,
    client: ClientMeta,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthServiceError> {
    let usecase = RefreshTokenUseCase {
        issuer: state.token_issuer(),
        audit: state.audit_trail(),
    };
    let pair = usecase.execute(&body.refresh_token, &client).await?;
    Ok(Json(RefreshResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
    }))
}

// ── POST /auth/logout ─────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// The body is optional; without a refresh token every session of the caller ends.
pub async fn logout(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    client: ClientMeta,
    body: Option<Json<LogoutRequest>>,
) -> Result<Json<MessageResponse>, AuthServiceError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let usecase = LogoutUseCase {
        users: state.user_repo(),
        issuer: state.token_issuer(),
        audit: state.audit_trail(),
    };
    let out = usecase
        .execute(caller.user_id, body.refresh_token.as_deref(), &client)
        .await?;
    Ok(Json(MessageResponse {
        message: out.message,
    }))
}
