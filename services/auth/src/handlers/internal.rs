use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tollgate_domain::contact::ContactKind;

use crate::error::AuthServiceError;
use crate::handlers::InternalCaller;
use crate::state::AppState;
use crate::usecase::cleanup::CleanupUseCase;
use crate::usecase::identity::{
    ResolveOrCreateInput, ResolveOrCreateOutput, ResolveOrCreateUserUseCase,
};

// ── POST /internal/users/resolve-or-create ────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOrCreateRequest {
    pub identity_key: String,
    pub identity_type: ContactKind,
    pub name: Option<String>,
}

/// Flat view consumed by the identity service. Unlike the public user view, the stored
/// phone is returned as-is, including the placeholder of an email-only user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOrCreateResponse {
    pub user_id: Uuid,
    pub is_verified: bool,
    pub is_new: bool,
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
}

impl From<ResolveOrCreateOutput> for ResolveOrCreateResponse {
    fn from(out: ResolveOrCreateOutput) -> Self {
        Self {
            user_id: out.user.id,
            is_verified: out.user.is_verified,
            is_new: out.is_new,
            phone: out.user.phone,
            email: out.user.email,
            name: out.user.name,
        }
    }
}

pub async fn resolve_or_create_user(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(body): Json<ResolveOrCreateRequest>,
) -> Result<Json<ResolveOrCreateResponse>, AuthServiceError> {
    let usecase = ResolveOrCreateUserUseCase {
        resolver: state.identity_resolver(),
    };
    let out = usecase
        .execute(ResolveOrCreateInput {
            identity_key: body.identity_key,
            identity_type: body.identity_type,
            name: body.name,
        })
        .await?;
    Ok(Json(out.into()))
}

// ── POST /internal/cleanup ────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub deleted_tokens: u64,
    pub deleted_otps: u64,
}

pub async fn run_cleanup(
    State(state): State<AppState>,
    _caller: InternalCaller,
) -> Result<Json<CleanupResponse>, AuthServiceError> {
    let usecase = CleanupUseCase {
        otps: state.otp_store(),
        issuer: state.token_issuer(),
    };
    let report = usecase.execute().await?;
    Ok(Json(CleanupResponse {
        deleted_tokens: report.deleted_tokens,
        deleted_otps: report.deleted_otps,
    }))
}
