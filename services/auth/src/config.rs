use chrono::Duration;
use serde::{Deserialize, Deserializer};
use url::Url;

use tollgate_core::config::{Config, ConfigError};

use crate::domain::types::{OTP_MAX_LEN, OTP_MIN_LEN};
use crate::usecase::otp::OtpPolicy;
use crate::usecase::token::TokenPolicy;

/// Auth service configuration. Each field reads the upper-cased env var of the same name.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL (rate-limit buckets).
    pub redis_url: String,
    /// HMAC secret for signing access and refresh tokens.
    pub jwt_secret: String,
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: i64,
    #[serde(default = "default_otp_length")]
    pub otp_length: usize,
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,
    /// Base URL of the identity service notified after each login.
    #[serde(deserialize_with = "base_url")]
    pub identity_service_url: Url,
    /// Base URL of the notification service that delivers OTPs.
    #[serde(deserialize_with = "base_url")]
    pub notification_service_url: Url,
    pub notification_api_key: String,
    /// Shared secret expected in `X-Internal-Api-Key` on `/internal/*` routes.
    pub internal_api_key: String,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_outbound_timeout_secs")]
    pub outbound_timeout_secs: u64,
}

/// Parses a base URL and makes its path end in `/`, so relative joins append to the last
/// segment instead of replacing it.
fn base_url<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Url, D::Error> {
    let mut url: Url = Url::deserialize(deserializer)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn default_auth_port() -> u16 {
    3112
}

fn default_access_token_ttl_secs() -> i64 {
    900
}

fn default_refresh_token_ttl_days() -> i64 {
    7
}

fn default_otp_length() -> usize {
    6
}

fn default_otp_ttl_minutes() -> i64 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_outbound_timeout_secs() -> u64 {
    5
}

impl Config for AuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "JWT_SECRET must be at least 32 bytes".into(),
            ));
        }
        if !(OTP_MIN_LEN..=OTP_MAX_LEN).contains(&self.otp_length) {
            return Err(ConfigError::Invalid(format!(
                "OTP_LENGTH must be between {OTP_MIN_LEN} and {OTP_MAX_LEN}"
            )));
        }
        if self.access_token_ttl_secs <= 0
            || self.refresh_token_ttl_days <= 0
            || self.otp_ttl_minutes <= 0
        {
            return Err(ConfigError::Invalid("token and otp TTLs must be positive".into()));
        }
        if self.internal_api_key.is_empty() {
            return Err(ConfigError::Invalid("INTERNAL_API_KEY must not be empty".into()));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            length: self.otp_length,
            ttl: Duration::minutes(self.otp_ttl_minutes),
        }
    }

    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            access_ttl: Duration::seconds(self.access_token_ttl_secs),
            refresh_ttl: Duration::days(self.refresh_token_ttl_days),
        }
    }
}
