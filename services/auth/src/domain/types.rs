use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tollgate_domain::contact::is_placeholder_phone;
use tollgate_domain::user::{UserRole, UserStatus};

/// Default display name for users created without one.
pub const DEFAULT_USER_NAME: &str = "Guest";

pub const OTP_MIN_LEN: usize = 4;
pub const OTP_MAX_LEN: usize = 10;

pub const PASSKEY_MIN_LEN: usize = 4;
pub const PASSKEY_MAX_LEN: usize = 20;

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
    pub role: UserRole,
    pub passkey_hash: Option<String>,
    pub status: UserStatus,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_passkey(&self) -> bool {
        self.passkey_hash.is_some()
    }

    /// The stored phone, unless it is a synthesized placeholder.
    pub fn real_phone(&self) -> Option<&str> {
        (!is_placeholder_phone(&self.phone)).then_some(self.phone.as_str())
    }

    /// The identifier the user actually signs in with, for audit rows.
    pub fn login_identifier(&self) -> &str {
        self.real_phone()
            .or(self.email.as_deref())
            .unwrap_or(&self.phone)
    }
}

/// Profile fields to overwrite. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A unique constraint rejected the row: another writer got there first.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(User),
    NotFound,
    EmailTaken,
}

/// One-time passcode addressed to a phone or email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCode {
    pub id: Uuid,
    pub identifier: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl OtpCode {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ── Audit ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    OtpSent,
    OtpVerified,
    OtpFailed,
    UserSignup,
    UserLoginOtp,
    UserLoginPasskey,
    PasskeyLoginFailed,
    PasskeySet,
    TokenRefreshed,
    UserLogout,
    ProfileUpdated,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OtpSent => "OTP_SENT",
            Self::OtpVerified => "OTP_VERIFIED",
            Self::OtpFailed => "OTP_FAILED",
            Self::UserSignup => "USER_SIGNUP",
            Self::UserLoginOtp => "USER_LOGIN_OTP",
            Self::UserLoginPasskey => "USER_LOGIN_PASSKEY",
            Self::PasskeyLoginFailed => "PASSKEY_LOGIN_FAILED",
            Self::PasskeySet => "PASSKEY_SET",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserLogout => "USER_LOGOUT",
            Self::ProfileUpdated => "PROFILE_UPDATED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub identifier: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Caller network metadata recorded alongside audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ── Rate limiting ────────────────────────────────────────────────────────────

/// Token-bucket parameters: `capacity` tokens, refilled continuously at
/// `refill_tokens` per `refill_period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    pub capacity: u32,
    pub refill_tokens: u32,
    pub refill_period: Duration,
}

impl BucketPolicy {
    pub fn period_ms(&self) -> u64 {
        u64::try_from(self.refill_period.as_millis()).unwrap_or(u64::MAX)
    }

    /// Fill level of a full bucket, in the units of [`TokenBucket::level`].
    pub fn full_level(&self) -> u64 {
        u64::from(self.capacity).saturating_mul(self.period_ms())
    }

    /// Time for an empty bucket to become full. Idle buckets can expire after this.
    pub fn full_refill_ms(&self) -> u64 {
        self.full_level().div_ceil(u64::from(self.refill_tokens.max(1)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitAction {
    OtpSend,
    OtpVerify,
    PasskeyLogin,
}

impl RateLimitAction {
    pub fn policy(self) -> BucketPolicy {
        match self {
            Self::OtpSend => BucketPolicy {
                capacity: 3,
                refill_tokens: 3,
                refill_period: Duration::from_secs(10 * 60),
            },
            Self::OtpVerify | Self::PasskeyLogin => BucketPolicy {
                capacity: 5,
                refill_tokens: 5,
                refill_period: Duration::from_secs(5 * 60),
            },
        }
    }

    pub fn bucket_key(self, identifier: &str) -> String {
        let prefix = match self {
            Self::OtpSend => "rate:otp:send:",
            Self::OtpVerify => "rate:otp:verify:",
            Self::PasskeyLogin => "rate:passkey:login:",
        };
        format!("{prefix}{identifier}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Allowed { remaining: u32 },
    Denied { retry_after_ms: u64 },
}

/// Token-bucket state with greedy (continuous) refill.
///
/// `level` counts tokens scaled by the refill period in ms: one token is `period_ms` units
/// and every elapsed ms adds `refill_tokens` units. All arithmetic stays in integers, so
/// repeated partial refills never drift. The Redis store runs the same arithmetic in Lua
/// and in-memory stores use this type directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucket {
    pub level: u64,
    pub updated_at_ms: i64,
}

impl TokenBucket {
    pub fn full(policy: &BucketPolicy, now_ms: i64) -> Self {
        Self {
            level: policy.full_level(),
            updated_at_ms: now_ms,
        }
    }

    /// Whole tokens currently in the bucket.
    pub fn tokens(&self, policy: &BucketPolicy) -> u64 {
        self.level / policy.period_ms().max(1)
    }

    /// Refill for the elapsed time, then try to take one token.
    pub fn try_consume(self, policy: &BucketPolicy, now_ms: i64) -> (Self, Consumption) {
        let cost = policy.period_ms().max(1);
        let refill = u64::from(policy.refill_tokens.max(1));
        let elapsed = u64::try_from(now_ms - self.updated_at_ms).unwrap_or(0);
        let level = self
            .level
            .saturating_add(elapsed.saturating_mul(refill))
            .min(policy.full_level());
        let updated_at_ms = now_ms.max(self.updated_at_ms);

        if level >= cost {
            let level = level - cost;
            let remaining = u32::try_from(level / cost).unwrap_or(u32::MAX);
            (
                Self {
                    level,
                    updated_at_ms,
                },
                Consumption::Allowed { remaining },
            )
        } else {
            let retry_after_ms = (cost - level).div_ceil(refill);
            (
                Self {
                    level,
                    updated_at_ms,
                },
                Consumption::Denied { retry_after_ms },
            )
        }
    }
}
