use std::sync::Arc;

use anyhow::Context as _;
use serde_json::json;
use uuid::Uuid;

use tollgate_domain::clock::Clock;
use tollgate_domain::contact::normalize_phone;

use crate::domain::repository::{
    AuditLogRepository, BucketStore, IdentityNotifier, RefreshTokenRepository, SecretHasher,
    UserRepository,
};
use crate::domain::types::{
    AuditAction, ClientMeta, PASSKEY_MAX_LEN, PASSKEY_MIN_LEN, RateLimitAction,
};
use crate::error::AuthServiceError;
use crate::usecase::audit::{AuditEvent, AuditTrail};
use crate::usecase::identity::notify_onboard;
use crate::usecase::rate_limit::RateLimiter;
use crate::usecase::token::{LoginOutput, TokenIssuer};

pub const PASSKEY_SET_MESSAGE: &str = "Passkey set successfully";

fn check_passkey_shape(passkey: &str) -> Result<(), AuthServiceError> {
    let len = passkey.chars().count();
    if !(PASSKEY_MIN_LEN..=PASSKEY_MAX_LEN).contains(&len) {
        return Err(AuthServiceError::validation(format!(
            "passkey must be between {PASSKEY_MIN_LEN} and {PASSKEY_MAX_LEN} characters"
        )));
    }
    Ok(())
}

async fn hash_blocking(
    hasher: &Arc<dyn SecretHasher>,
    secret: &str,
) -> Result<String, AuthServiceError> {
    let hasher = Arc::clone(hasher);
    let secret = secret.to_owned();
    tokio::task::spawn_blocking(move || hasher.hash(&secret))
        .await
        .context("passkey hash task")?
}

async fn verify_blocking(
    hasher: &Arc<dyn SecretHasher>,
    secret: &str,
    digest: &str,
) -> Result<bool, AuthServiceError> {
    let hasher = Arc::clone(hasher);
    let secret = secret.to_owned();
    let digest = digest.to_owned();
    tokio::task::spawn_blocking(move || hasher.verify(&secret, &digest))
        .await
        .context("passkey verify task")?
}

// ── PasskeyLogin ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PasskeyLoginInput {
    pub phone: String,
    pub passkey: String,
}

/// Phone + passkey login for users who already set one after an OTP login.
pub struct PasskeyLoginUseCase<U, R, B, A, N>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    B: BucketStore,
    A: AuditLogRepository,
    N: IdentityNotifier,
{
    pub users: U,
    pub issuer: TokenIssuer<R>,
    pub limiter: RateLimiter<B>,
    pub audit: AuditTrail<A>,
    pub notifier: N,
    pub hasher: Arc<dyn SecretHasher>,
}

impl<U, R, B, A, N> PasskeyLoginUseCase<U, R, B, A, N>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    B: BucketStore,
    A: AuditLogRepository,
    N: IdentityNotifier,
{
    pub async fn execute(
        &self,
        input: PasskeyLoginInput,
        client: &ClientMeta,
    ) -> Result<LoginOutput, AuthServiceError> {
        let phone = normalize_phone(&input.phone)?;
        check_passkey_shape(&input.passkey)?;

        self.limiter
            .check_and_consume(RateLimitAction::PasskeyLogin, &phone)
            .await?;

        let user = self
            .users
            .find_by_phone(&phone)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;
        if !user.status.is_active() {
            return Err(AuthServiceError::AccountInactive);
        }
        let digest = user
            .passkey_hash
            .as_deref()
            .ok_or(AuthServiceError::PasskeyNotSet)?;

        if !verify_blocking(&self.hasher, &input.passkey, digest).await? {
            self.audit
                .record(
                    AuditEvent::failure(AuditAction::PasskeyLoginFailed, phone.as_str())
                        .user(user.id)
                        .metadata(json!({ "reason": "Invalid passkey" })),
                    client,
                )
                .await;
            return Err(AuthServiceError::InvalidPasskey);
        }

        let tokens = self.issuer.issue_pair(&user).await?;

        self.audit
            .record(
                AuditEvent::success(AuditAction::UserLoginPasskey, phone.as_str()).user(user.id),
                client,
            )
            .await;
        self.limiter
            .reset(RateLimitAction::PasskeyLogin, &phone)
            .await;
        notify_onboard(&self.notifier, &user).await;

        tracing::info!(user_id = %user.id, "passkey login");
        Ok(LoginOutput {
            tokens,
            user,
            is_new_user: false,
        })
    }
}

// ── SetPasskey ───────────────────────────────────────────────────────────────

pub struct SetPasskeyUseCase<U: UserRepository, A: AuditLogRepository> {
    pub users: U,
    pub audit: AuditTrail<A>,
    pub hasher: Arc<dyn SecretHasher>,
    pub clock: Arc<dyn Clock>,
}

impl<U: UserRepository, A: AuditLogRepository> SetPasskeyUseCase<U, A> {
    /// Replaces any existing passkey.
    pub async fn execute(
        &self,
        user_id: Uuid,
        passkey: &str,
        client: &ClientMeta,
    ) -> Result<(), AuthServiceError> {
        check_passkey_shape(passkey)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        let digest = hash_blocking(&self.hasher, passkey).await?;
        if !self
            .users
            .set_passkey_hash(user.id, &digest, self.clock.now())
            .await?
        {
            return Err(AuthServiceError::UserNotFound);
        }

        self.audit
            .record(
                AuditEvent::success(AuditAction::PasskeySet, user.login_identifier())
                    .user(user.id),
                client,
            )
            .await;
        Ok(())
    }
}
