//! Outbound JSON clients for the identity and notification services.
//!
//! Both calls are fire-and-forget: the request runs on a spawned task and its outcome is
//! only logged. `Err` from the port methods means the request could not even be built.

use anyhow::Context as _;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use tollgate_domain::contact::{mask_email, mask_phone};

use crate::domain::repository::{
    IdentityNotifier, OnboardRequest, OtpChannel, OtpDelivery, OtpDispatcher,
};
use crate::error::AuthServiceError;

const ONBOARD_PATH: &str = "internal/users/onboard";
const NOTIFICATION_PATH: &str = "internal/notifications/send";

// ── Identity service ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpIdentityClient {
    pub http: reqwest::Client,
    pub base_url: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OnboardBody {
    auth_user_id: Uuid,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    is_verified: bool,
}

impl From<&OnboardRequest> for OnboardBody {
    fn from(request: &OnboardRequest) -> Self {
        Self {
            auth_user_id: request.user_id,
            name: request.name.clone(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            is_verified: true,
        }
    }
}

impl IdentityNotifier for HttpIdentityClient {
    async fn onboard(&self, request: &OnboardRequest) -> Result<(), AuthServiceError> {
        let url = self
            .base_url
            .join(ONBOARD_PATH)
            .context("build identity onboard url")?;
        let body = OnboardBody::from(request);
        let http = self.http.clone();
        let user_id = request.user_id;

        tokio::spawn(async move {
            let result = http
                .post(url)
                .json(&body)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());
            match result {
                Ok(_) => tracing::debug!(%user_id, "identity onboard delivered"),
                Err(e) => tracing::warn!(%user_id, error = %e, "identity onboard failed"),
            }
        });
        Ok(())
    }
}

// ── Notification service ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpNotificationClient {
    pub http: reqwest::Client,
    pub base_url: Url,
    pub api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationBody {
    template_key: &'static str,
    channel: &'static str,
    recipient: String,
    data: serde_json::Value,
    priority: &'static str,
    idempotency_key: String,
}

impl From<&OtpDelivery> for NotificationBody {
    fn from(delivery: &OtpDelivery) -> Self {
        let (template_key, channel) = match delivery.channel {
            OtpChannel::Sms => ("OTP_SMS", "SMS"),
            OtpChannel::Email => ("OTP_EMAIL", "EMAIL"),
        };
        Self {
            template_key,
            channel,
            recipient: delivery.recipient.clone(),
            data: serde_json::json!({
                "otp": delivery.code,
                "ttl": delivery.ttl_minutes,
            }),
            priority: "HIGH",
            idempotency_key: format!("otp-{}", delivery.otp_id),
        }
    }
}

impl OtpDispatcher for HttpNotificationClient {
    async fn send_otp(&self, delivery: &OtpDelivery) -> Result<(), AuthServiceError> {
        let url = self
            .base_url
            .join(NOTIFICATION_PATH)
            .context("build notification url")?;
        let body = NotificationBody::from(delivery);
        let http = self.http.clone();
        let api_key = self.api_key.clone();
        let recipient = match delivery.channel {
            OtpChannel::Sms => mask_phone(&delivery.recipient),
            OtpChannel::Email => mask_email(&delivery.recipient),
        };

        tokio::spawn(async move {
            let result = http
                .post(url)
                .header("X-API-Key", api_key)
                .json(&body)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());
            match result {
                Ok(_) => tracing::info!(%recipient, "otp handed to notification service"),
                Err(e) => tracing::warn!(%recipient, error = %e, "otp dispatch failed"),
            }
        });
        Ok(())
    }
}
