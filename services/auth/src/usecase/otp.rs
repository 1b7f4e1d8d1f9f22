use std::sync::Arc;

use anyhow::anyhow;
use rand::RngExt as _;
use serde_json::json;

use tollgate_domain::clock::Clock;
use tollgate_domain::contact::Contact;
use tollgate_domain::id::IdGenerator;

use crate::domain::repository::{
    AuditLogRepository, BucketStore, IdentityNotifier, OtpChannel, OtpDelivery, OtpDispatcher,
    OtpRepository, RefreshTokenRepository, UserRepository,
};
use crate::domain::types::{
    AuditAction, ClientMeta, OTP_MAX_LEN, OTP_MIN_LEN, OtpCode, RateLimitAction,
};
use crate::error::AuthServiceError;
use crate::usecase::audit::{AuditEvent, AuditTrail};
use crate::usecase::identity::{IdentityResolver, PhoneMatch, Resolution, notify_onboard};
use crate::usecase::rate_limit::RateLimiter;
use crate::usecase::token::{LoginOutput, TokenIssuer};
use crate::usecase::user::normalize_name;

pub const OTP_SENT_MESSAGE: &str = "OTP sent successfully";

#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub length: usize,
    pub ttl: chrono::Duration,
}

/// Uniformly random decimal digits from the thread-local CSPRNG.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn check_code_shape(raw: &str) -> Result<&str, AuthServiceError> {
    let code = raw.trim();
    if !(OTP_MIN_LEN..=OTP_MAX_LEN).contains(&code.len())
        || !code.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AuthServiceError::validation(format!(
            "otp must be {OTP_MIN_LEN} to {OTP_MAX_LEN} digits"
        )));
    }
    Ok(code)
}

/// Issues and redeems one-time passcodes.
///
/// Codes are single use. Consuming one also burns every other outstanding code for the
/// same identifier, so only the freshest code a user was sent can ever log them in.
pub struct OtpStore<O: OtpRepository> {
    pub otps: O,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<IdGenerator>,
    pub policy: OtpPolicy,
}

impl<O: OtpRepository> OtpStore<O> {
    pub async fn issue(&self, identifier: &str) -> Result<OtpCode, AuthServiceError> {
        let now = self.clock.now();
        let otp = OtpCode {
            id: self.ids.next_id(),
            identifier: identifier.to_owned(),
            code: generate_code(self.policy.length),
            expires_at: now + self.policy.ttl,
            used: false,
            created_at: now,
        };
        self.otps.create(&otp).await?;
        Ok(otp)
    }

    pub async fn verify(
        &self,
        identifier: &str,
        code: &str,
    ) -> Result<Option<OtpCode>, AuthServiceError> {
        self.otps.find_valid(identifier, code, self.clock.now()).await
    }

    /// `false` when a concurrent caller consumed the code first.
    pub async fn consume(&self, otp: &OtpCode) -> Result<bool, AuthServiceError> {
        self.otps.consume(otp).await
    }

    pub async fn sweep(&self) -> Result<u64, AuthServiceError> {
        self.otps.delete_expired_or_used(self.clock.now()).await
    }
}

// ── SendOtp ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SendOtpInput {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug)]
pub struct SendOtpOutput {
    pub message: &'static str,
    pub expires_in: i64,
}

pub struct SendOtpUseCase<O, B, A, D>
where
    O: OtpRepository,
    B: BucketStore,
    A: AuditLogRepository,
    D: OtpDispatcher,
{
    pub otps: OtpStore<O>,
    pub limiter: RateLimiter<B>,
    pub audit: AuditTrail<A>,
    pub dispatcher: D,
}

impl<O, B, A, D> SendOtpUseCase<O, B, A, D>
where
    O: OtpRepository,
    B: BucketStore,
    A: AuditLogRepository,
    D: OtpDispatcher,
{
    pub async fn execute(
        &self,
        input: SendOtpInput,
        client: &ClientMeta,
    ) -> Result<SendOtpOutput, AuthServiceError> {
        let contact = Contact::from_parts(input.phone.as_deref(), input.email.as_deref())?;
        let identifier = contact.as_str();

        self.limiter
            .check_and_consume(RateLimitAction::OtpSend, identifier)
            .await?;

        let otp = self.otps.issue(identifier).await?;

        self.audit
            .record(
                AuditEvent::success(AuditAction::OtpSent, identifier)
                    .metadata(json!({ "expiresAt": otp.expires_at.to_rfc3339() })),
                client,
            )
            .await;

        let delivery = OtpDelivery {
            otp_id: otp.id,
            channel: match contact {
                Contact::Phone(_) => OtpChannel::Sms,
                Contact::Email(_) => OtpChannel::Email,
            },
            recipient: identifier.to_owned(),
            code: otp.code,
            ttl_minutes: self.otps.policy.ttl.num_minutes(),
        };
        if let Err(e) = self.dispatcher.send_otp(&delivery).await {
            tracing::warn!(contact = %contact.masked(), error = %e, "otp delivery hand-off failed");
        }

        tracing::info!(contact = %contact.masked(), "otp issued");
        Ok(SendOtpOutput {
            message: OTP_SENT_MESSAGE,
            expires_in: self.otps.policy.ttl.num_seconds(),
        })
    }
}

// ── VerifyOtp ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct VerifyOtpInput {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub otp: String,
    /// Used only if this login creates the user.
    pub name: Option<String>,
}

pub struct VerifyOtpUseCase<U, O, R, B, A, N>
where
    U: UserRepository,
    O: OtpRepository,
    R: RefreshTokenRepository,
    B: BucketStore,
    A: AuditLogRepository,
    N: IdentityNotifier,
{
    pub resolver: IdentityResolver<U>,
    pub otps: OtpStore<O>,
    pub issuer: TokenIssuer<R>,
    pub limiter: RateLimiter<B>,
    pub audit: AuditTrail<A>,
    pub notifier: N,
}

impl<U, O, R, B, A, N> VerifyOtpUseCase<U, O, R, B, A, N>
where
    U: UserRepository,
    O: OtpRepository,
    R: RefreshTokenRepository,
    B: BucketStore,
    A: AuditLogRepository,
    N: IdentityNotifier,
{
    pub async fn execute(
        &self,
        input: VerifyOtpInput,
        client: &ClientMeta,
    ) -> Result<LoginOutput, AuthServiceError> {
        let contact = Contact::from_parts(input.phone.as_deref(), input.email.as_deref())?;
        let code = check_code_shape(&input.otp)?;
        let name = normalize_name(input.name.as_deref())?;
        let identifier = contact.as_str();

        self.limiter
            .check_and_consume(RateLimitAction::OtpVerify, identifier)
            .await?;

        let Some(otp) = self.otps.verify(identifier, code).await? else {
            self.record_failure(identifier, "Invalid or expired OTP", client)
                .await;
            return Err(AuthServiceError::InvalidOtp);
        };
        if !self.otps.consume(&otp).await? {
            self.record_failure(identifier, "OTP already used", client)
                .await;
            return Err(AuthServiceError::InvalidOtp);
        }

        let (mut user, is_new_user) = match self
            .resolver
            .resolve(&contact, PhoneMatch::Exact, name.as_deref(), true)
            .await?
        {
            Resolution::Found(user) => (user, false),
            Resolution::CreatedNew(user) => {
                self.audit
                    .record(
                        AuditEvent::success(AuditAction::UserSignup, identifier)
                            .user(user.id)
                            .metadata(json!({ "name": user.name })),
                        client,
                    )
                    .await;
                (user, true)
            }
            Resolution::RetryExhausted => {
                return Err(AuthServiceError::Internal(anyhow!(
                    "could not resolve user for {}",
                    contact.masked()
                )));
            }
        };

        if !user.status.is_active() {
            return Err(AuthServiceError::AccountInactive);
        }
        if !user.is_verified {
            self.resolver
                .users
                .mark_verified(user.id, self.resolver.clock.now())
                .await?;
            user.is_verified = true;
        }

        let tokens = self.issuer.issue_pair(&user).await?;

        self.audit
            .record(
                AuditEvent::success(AuditAction::OtpVerified, identifier)
                    .user(user.id)
                    .metadata(json!({ "isNewUser": is_new_user })),
                client,
            )
            .await;
        self.audit
            .record(
                AuditEvent::success(AuditAction::UserLoginOtp, identifier).user(user.id),
                client,
            )
            .await;

        self.limiter
            .reset(RateLimitAction::OtpVerify, identifier)
            .await;
        notify_onboard(&self.notifier, &user).await;

        tracing::info!(user_id = %user.id, is_new_user, "otp login");
        Ok(LoginOutput {
            tokens,
            user,
            is_new_user,
        })
    }

    async fn record_failure(&self, identifier: &str, reason: &str, client: &ClientMeta) {
        self.audit
            .record(
                AuditEvent::failure(AuditAction::OtpFailed, identifier)
                    .metadata(json!({ "reason": reason })),
                client,
            )
            .await;
    }
}
