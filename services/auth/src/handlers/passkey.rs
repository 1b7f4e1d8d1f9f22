use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use tollgate_auth_types::identity::AuthenticatedUser;

use crate::domain::types::ClientMeta;
use crate::error::AuthServiceError;
use crate::handlers::otp::LoginResponse;
use crate::state::AppState;
use crate::usecase::passkey::{
    PASSKEY_SET_MESSAGE, PasskeyLoginInput, PasskeyLoginUseCase, SetPasskeyUseCase,
};

// ── POST /auth/passkey/login ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PasskeyLoginRequest {
    pub phone: String,
    pub passkey: String,
}

pub async fn passkey_login(
    State(state): State<AppState>,
    client: ClientMeta,
    Json(body): Json<PasskeyLoginRequest>,
) -> Result<Json<LoginResponse>, AuthServiceError> {
    let usecase = PasskeyLoginUseCase {
        users: state.user_repo(),
        issuer: state.token_issuer(),
        limiter: state.rate_limiter(),
        audit: state.audit_trail(),
        notifier: state.identity_client(),
        hasher: state.hasher.clone(),
    };
    let out = usecase
        .execute(
            PasskeyLoginInput {
                phone: body.phone,
                passkey: body.passkey,
            },
            &client,
        )
        .await?;
    Ok(Json(out.into()))
}

// ── POST /auth/passkey/set ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SetPasskeyRequest {
    pub passkey: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn set_passkey(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    client: ClientMeta,
    Json(body): Json<SetPasskeyRequest>,
) -> Result<Json<MessageResponse>, AuthServiceError> {
    let usecase = SetPasskeyUseCase {
        users: state.user_repo(),
        audit: state.audit_trail(),
        hasher: state.hasher.clone(),
        clock: state.clock.clone(),
    };
    usecase
        .execute(caller.user_id, &body.passkey, &client)
        .await?;
    Ok(Json(MessageResponse {
        message: PASSKEY_SET_MESSAGE,
    }))
}
