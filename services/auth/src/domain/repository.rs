#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    AuditEntry, BucketPolicy, Consumption, InsertOutcome, OtpCode, ProfileChanges,
    RefreshTokenRecord, UpdateOutcome, User,
};
use crate::error::AuthServiceError;

/// Repository for user accounts.
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthServiceError>;

    /// Exact match on the normalized phone.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AuthServiceError>;

    /// Oldest user whose phone ends with `suffix` (the last 10 digits).
    async fn find_by_phone_suffix(&self, suffix: &str)
    -> Result<Option<User>, AuthServiceError>;

    /// Case-insensitive match on email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthServiceError>;

    /// Insert a new user. A unique-constraint violation is reported as
    /// [`InsertOutcome::Duplicate`], not as an error.
    async fn insert(&self, user: &User) -> Result<InsertOutcome, AuthServiceError>;

    /// Flip `is_verified` to true. No-op when already verified.
    async fn mark_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError>;

    /// Returns `false` when the user does not exist.
    async fn set_passkey_hash(
        &self,
        id: Uuid,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthServiceError>;

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, AuthServiceError>;
}

/// Repository for one-time passcodes.
pub trait OtpRepository: Send + Sync {
    async fn create(&self, otp: &OtpCode) -> Result<(), AuthServiceError>;

    /// Most recently created unused, unexpired code matching identifier and code.
    async fn find_valid(
        &self,
        identifier: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpCode>, AuthServiceError>;

    /// In one transaction: flip `otp` from unused to used, then mark every other unused
    /// code for the same identifier used. Returns `false` (and changes nothing) when
    /// `otp` was already used by a concurrent caller.
    async fn consume(&self, otp: &OtpCode) -> Result<bool, AuthServiceError>;

    /// Delete codes that are expired or used. Returns the number deleted.
    async fn delete_expired_or_used(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError>;
}

/// Repository for persisted refresh tokens.
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthServiceError>;

    /// The stored token row together with its owner.
    async fn find_with_user(
        &self,
        token: &str,
    ) -> Result<Option<(RefreshTokenRecord, User)>, AuthServiceError>;

    /// In one transaction: delete `old_token` for `next.user_id`, delete every other token
    /// of that user, insert `next`. Returns `false` (and changes nothing) when `old_token`
    /// no longer exists, i.e. a concurrent rotation already consumed it.
    async fn rotate(
        &self,
        old_token: &str,
        next: &RefreshTokenRecord,
    ) -> Result<bool, AuthServiceError>;

    async fn delete_one(&self, user_id: Uuid, token: &str) -> Result<u64, AuthServiceError>;

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthServiceError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError>;
}

/// Append-only audit storage.
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuthServiceError>;
}

/// Shared token-bucket storage. Each call must be atomic across processes.
pub trait BucketStore: Send + Sync {
    async fn try_consume(
        &self,
        key: &str,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> Result<Consumption, AuthServiceError>;

    /// Replace the bucket with a full one.
    async fn reset(
        &self,
        key: &str,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> Result<(), AuthServiceError>;
}

/// Payload for the identity service after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardRequest {
    pub user_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Downstream identity service. Implementations may deliver asynchronously; an `Err`
/// only means the hand-off itself failed.
pub trait IdentityNotifier: Send + Sync {
    async fn onboard(&self, request: &OnboardRequest) -> Result<(), AuthServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpChannel {
    Sms,
    Email,
}

/// An OTP to hand to the delivery service. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpDelivery {
    pub otp_id: Uuid,
    pub channel: OtpChannel,
    pub recipient: String,
    pub code: String,
    pub ttl_minutes: i64,
}

/// Downstream SMS/email delivery.
pub trait OtpDispatcher: Send + Sync {
    async fn send_otp(&self, delivery: &OtpDelivery) -> Result<(), AuthServiceError>;
}

/// One-way hash used for passkeys. Synchronous and CPU-bound: call it off the async
/// executor.
pub trait SecretHasher: Send + Sync + 'static {
    fn hash(&self, secret: &str) -> Result<String, AuthServiceError>;

    fn verify(&self, secret: &str, digest: &str) -> Result<bool, AuthServiceError>;
}
