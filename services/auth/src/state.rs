use std::sync::Arc;

use axum::extract::FromRef;
use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;

use tollgate_auth_types::token::TokenVerifier;
use tollgate_domain::clock::Clock;
use tollgate_domain::id::IdGenerator;

use crate::config::AuthConfig;
use crate::domain::repository::SecretHasher;
use crate::infra::db::{
    DbAuditLogRepository, DbOtpRepository, DbRefreshTokenRepository, DbUserRepository,
};
use crate::infra::http::{HttpIdentityClient, HttpNotificationClient};
use crate::infra::rate_limit::RedisBucketStore;
use crate::usecase::audit::AuditTrail;
use crate::usecase::identity::IdentityResolver;
use crate::usecase::otp::OtpStore;
use crate::usecase::rate_limit::RateLimiter;
use crate::usecase::token::TokenIssuer;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub http: reqwest::Client,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<IdGenerator>,
    pub hasher: Arc<dyn SecretHasher>,
    pub verifier: TokenVerifier,
    pub config: Arc<AuthConfig>,
}

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl AppState {
    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn otp_repo(&self) -> DbOtpRepository {
        DbOtpRepository {
            db: self.db.clone(),
        }
    }

    pub fn refresh_token_repo(&self) -> DbRefreshTokenRepository {
        DbRefreshTokenRepository {
            db: self.db.clone(),
        }
    }

    pub fn bucket_store(&self) -> RedisBucketStore {
        RedisBucketStore {
            pool: self.redis.clone(),
        }
    }

    pub fn identity_client(&self) -> HttpIdentityClient {
        HttpIdentityClient {
            http: self.http.clone(),
            base_url: self.config.identity_service_url.clone(),
        }
    }

    pub fn notification_client(&self) -> HttpNotificationClient {
        HttpNotificationClient {
            http: self.http.clone(),
            base_url: self.config.notification_service_url.clone(),
            api_key: self.config.notification_api_key.clone(),
        }
    }

    pub fn audit_trail(&self) -> AuditTrail<DbAuditLogRepository> {
        AuditTrail {
            logs: DbAuditLogRepository {
                db: self.db.clone(),
            },
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter<RedisBucketStore> {
        RateLimiter {
            store: self.bucket_store(),
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn identity_resolver(&self) -> IdentityResolver<DbUserRepository> {
        IdentityResolver {
            users: self.user_repo(),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
        }
    }

    pub fn otp_store(&self) -> OtpStore<DbOtpRepository> {
        OtpStore {
            otps: self.otp_repo(),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
            policy: self.config.otp_policy(),
        }
    }

    pub fn token_issuer(&self) -> TokenIssuer<DbRefreshTokenRepository> {
        TokenIssuer {
            tokens: self.refresh_token_repo(),
            jwt_secret: self.config.jwt_secret.clone(),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
            policy: self.config.token_policy(),
        }
    }
}
