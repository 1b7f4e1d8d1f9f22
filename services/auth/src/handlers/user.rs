use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tollgate_auth_types::identity::AuthenticatedUser;
use tollgate_core::serde::to_rfc3339_ms;
use tollgate_domain::user::{UserRole, UserStatus};

use crate::domain::types::{ClientMeta, User};
use crate::error::AuthServiceError;
use crate::state::AppState;
use crate::usecase::user::{GetCurrentUserUseCase, UpdateProfileInput, UpdateProfileUseCase};

/// Public view of a user. Placeholder phones are never exposed and the passkey hash is
/// reduced to a flag.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub is_verified: bool,
    pub has_passkey: bool,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            phone: user.real_phone().map(str::to_owned),
            has_passkey: user.has_passkey(),
            email: user.email,
            name: user.name,
            role: user.role,
            status: user.status,
            is_verified: user.is_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ── GET /auth/me ──────────────────────────────────────────────────────────────

pub async fn get_me(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<UserResponse>, AuthServiceError> {
    let usecase = GetCurrentUserUseCase {
        users: state.user_repo(),
    };
    let user = usecase.execute(caller.user_id).await?;
    Ok(Json(user.into()))
}

// ── PATCH /auth/me ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub async fn update_me(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    client: ClientMeta,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AuthServiceError> {
    let usecase = UpdateProfileUseCase {
        users: state.user_repo(),
        audit: state.audit_trail(),
        clock: state.clock.clone(),
    };
    let user = usecase
        .execute(
            caller.user_id,
            UpdateProfileInput {
                name: body.name,
                email: body.email,
            },
            &client,
        )
        .await?;
    Ok(Json(user.into()))
}

