use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use tollgate_domain::clock::Clock;
use tollgate_domain::contact::normalize_email;

use crate::domain::repository::{AuditLogRepository, UserRepository};
use crate::domain::types::{
    AuditAction, ClientMeta, NAME_MAX_LEN, NAME_MIN_LEN, ProfileChanges, UpdateOutcome, User,
};
use crate::error::AuthServiceError;
use crate::usecase::audit::{AuditEvent, AuditTrail};

/// Trim a display name. Blank means "not provided".
pub fn normalize_name(raw: Option<&str>) -> Result<Option<String>, AuthServiceError> {
    let Some(name) = raw.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(AuthServiceError::validation(format!(
            "name must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
        )));
    }
    Ok(Some(name.to_owned()))
}

// ── GetCurrentUser ───────────────────────────────────────────────────────────

pub struct GetCurrentUserUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> GetCurrentUserUseCase<U> {
    pub async fn execute(&self, user_id: Uuid) -> Result<User, AuthServiceError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)
    }
}

// ── UpdateProfile ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub struct UpdateProfileUseCase<U: UserRepository, A: AuditLogRepository> {
    pub users: U,
    pub audit: AuditTrail<A>,
    pub clock: Arc<dyn Clock>,
}

impl<U: UserRepository, A: AuditLogRepository> UpdateProfileUseCase<U, A> {
    /// Fields equal to the stored values are dropped; with nothing left the user is
    /// returned unchanged and no audit row is written.
    pub async fn execute(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
        client: &ClientMeta,
    ) -> Result<User, AuthServiceError> {
        let name = normalize_name(input.name.as_deref())?;
        let email = input
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(normalize_email)
            .transpose()?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        let changes = ProfileChanges {
            name: name.filter(|n| *n != user.name),
            email: email.filter(|e| user.email.as_deref() != Some(e.as_str())),
        };
        if changes.is_empty() {
            return Ok(user);
        }

        if let Some(email) = &changes.email {
            let owner = self.users.find_by_email(email).await?;
            if owner.is_some_and(|other| other.id != user.id) {
                return Err(AuthServiceError::EmailInUse);
            }
        }

        let updated = match self
            .users
            .update_profile(user.id, &changes, self.clock.now())
            .await?
        {
            UpdateOutcome::Updated(updated) => updated,
            UpdateOutcome::NotFound => return Err(AuthServiceError::UserNotFound),
            // Lost a race against another user claiming the same address.
            UpdateOutcome::EmailTaken => return Err(AuthServiceError::EmailInUse),
        };

        self.audit
            .record(
                AuditEvent::success(AuditAction::ProfileUpdated, updated.login_identifier())
                    .user(updated.id)
                    .metadata(json!({ "updatedFields": changes.field_names() })),
                client,
            )
            .await;

        Ok(updated)
    }
}
