use std::sync::Arc;

use anyhow::Context as _;
use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use tollgate_auth_types::token::{AccessClaims, RefreshClaims, TokenVerifier, sign_token};
use tollgate_domain::clock::Clock;
use tollgate_domain::id::IdGenerator;

use crate::domain::repository::{AuditLogRepository, RefreshTokenRepository, UserRepository};
use crate::domain::types::{AuditAction, ClientMeta, RefreshTokenRecord, User};
use crate::error::AuthServiceError;
use crate::usecase::audit::{AuditEvent, AuditTrail};

#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// Result of any successful login flow.
#[derive(Debug)]
pub struct LoginOutput {
    pub tokens: TokenPair,
    pub user: User,
    pub is_new_user: bool,
}

/// Mints access/refresh pairs and owns refresh-token rotation.
///
/// Rotation is delete-all-then-issue: a successful rotation leaves the user with exactly
/// one refresh token, and concurrent rotations of the same user collapse to one winner.
pub struct TokenIssuer<R: RefreshTokenRepository> {
    pub tokens: R,
    pub jwt_secret: String,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<IdGenerator>,
    pub policy: TokenPolicy,
}

impl<R: RefreshTokenRepository> TokenIssuer<R> {
    fn mint(&self, user: &User) -> Result<(TokenPair, RefreshTokenRecord), AuthServiceError> {
        let now = self.clock.now();
        let access_exp = now + self.policy.access_ttl;
        let refresh_exp = now + self.policy.refresh_ttl;

        let access_token = sign_token(
            &AccessClaims {
                sub: user.id.to_string(),
                phone: user.real_phone().unwrap_or_default().to_owned(),
                role: user.role,
                iat: now.timestamp(),
                exp: access_exp.timestamp(),
            },
            &self.jwt_secret,
        )
        .context("sign access token")?;

        let refresh_token = sign_token(
            &RefreshClaims {
                sub: user.id.to_string(),
                jti: Uuid::new_v4().to_string(),
                iat: now.timestamp(),
                exp: refresh_exp.timestamp(),
            },
            &self.jwt_secret,
        )
        .context("sign refresh token")?;

        let record = RefreshTokenRecord {
            id: self.ids.next_id(),
            token: refresh_token.clone(),
            user_id: user.id,
            expires_at: refresh_exp,
            created_at: now,
        };
        let pair = TokenPair {
            access_token,
            refresh_token,
            expires_in: self.policy.access_ttl.num_seconds(),
        };
        Ok((pair, record))
    }

    /// Mint a pair and persist its refresh token.
    pub async fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthServiceError> {
        let (pair, record) = self.mint(user)?;
        self.tokens.create(&record).await?;
        Ok(pair)
    }

    /// Exchange a live refresh token for a new pair.
    ///
    /// A validly signed token that is no longer stored (rotated, revoked, swept) is
    /// rejected like a forged one.
    pub async fn rotate(&self, presented: &str) -> Result<(TokenPair, User), AuthServiceError> {
        let verifier = TokenVerifier::new(&self.jwt_secret, Arc::clone(&self.clock));
        let claims = verifier.verify_refresh(presented).map_err(|e| {
            tracing::debug!(error = %e, "refresh token rejected");
            AuthServiceError::InvalidRefreshToken
        })?;

        let (record, user) = self
            .tokens
            .find_with_user(presented)
            .await?
            .ok_or(AuthServiceError::InvalidRefreshToken)?;
        if claims.sub.parse::<Uuid>().ok() != Some(record.user_id) {
            return Err(AuthServiceError::InvalidRefreshToken);
        }
        if !user.status.is_active() {
            return Err(AuthServiceError::AccountInactive);
        }

        let (pair, next) = self.mint(&user)?;
        if !self.tokens.rotate(presented, &next).await? {
            tracing::info!(user_id = %user.id, "refresh token lost a concurrent rotation");
            return Err(AuthServiceError::InvalidRefreshToken);
        }
        Ok((pair, user))
    }

    /// Delete one named token, or every token of the user when `token` is `None`.
    pub async fn revoke(&self, user_id: Uuid, token: Option<&str>) -> Result<u64, AuthServiceError> {
        match token {
            Some(token) => self.tokens.delete_one(user_id, token).await,
            None => self.tokens.delete_all_for_user(user_id).await,
        }
    }

    pub async fn sweep(&self) -> Result<u64, AuthServiceError> {
        self.tokens.delete_expired(self.clock.now()).await
    }
}

// ── RefreshToken ─────────────────────────────────────────────────────────────

pub struct RefreshTokenUseCase<R: RefreshTokenRepository, A: AuditLogRepository> {
    pub issuer: TokenIssuer<R>,
    pub audit: AuditTrail<A>,
}

impl<R: RefreshTokenRepository, A: AuditLogRepository> RefreshTokenUseCase<R, A> {
    pub async fn execute(
        &self,
        refresh_token: &str,
        client: &ClientMeta,
    ) -> Result<TokenPair, AuthServiceError> {
        if refresh_token.trim().is_empty() {
            return Err(AuthServiceError::validation("refresh token is required"));
        }
        let (pair, user) = self.issuer.rotate(refresh_token.trim()).await?;
        self.audit
            .record(
                AuditEvent::success(AuditAction::TokenRefreshed, user.login_identifier())
                    .user(user.id),
                client,
            )
            .await;
        Ok(pair)
    }
}

// ── Logout ───────────────────────────────────────────────────────────────────

pub const LOGOUT_MESSAGE: &str = "Logged out successfully";
pub const LOGOUT_ALL_MESSAGE: &str = "Logged out from all devices";

#[derive(Debug)]
pub struct LogoutOutput {
    pub message: &'static str,
    pub revoked: u64,
}

pub struct LogoutUseCase<U: UserRepository, R: RefreshTokenRepository, A: AuditLogRepository> {
    pub users: U,
    pub issuer: TokenIssuer<R>,
    pub audit: AuditTrail<A>,
}

impl<U, R, A> LogoutUseCase<U, R, A>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    A: AuditLogRepository,
{
    /// With a refresh token, revoke only that session; without one, revoke all of them.
    pub async fn execute(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
        client: &ClientMeta,
    ) -> Result<LogoutOutput, AuthServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        let token = refresh_token.map(str::trim).filter(|t| !t.is_empty());
        let all_devices = token.is_none();
        let revoked = self.issuer.revoke(user.id, token).await?;

        self.audit
            .record(
                AuditEvent::success(AuditAction::UserLogout, user.login_identifier())
                    .user(user.id)
                    .metadata(json!({ "allDevices": all_devices })),
                client,
            )
            .await;

        Ok(LogoutOutput {
            message: if all_devices {
                LOGOUT_ALL_MESSAGE
            } else {
                LOGOUT_MESSAGE
            },
            revoked,
        })
    }
}
