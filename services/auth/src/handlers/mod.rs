use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use crate::domain::types::ClientMeta;
use crate::error::AuthServiceError;
use crate::state::AppState;

pub mod health;
pub mod internal;
pub mod otp;
pub mod passkey;
pub mod token;
pub mod user;

pub const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client IP is the first `X-Forwarded-For` hop, else `X-Real-IP`.
fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let ip_address = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::to_owned);
    let user_agent = header_str(headers, USER_AGENT.as_str()).map(str::to_owned);
    ClientMeta {
        ip_address,
        user_agent,
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(client_meta(&parts.headers))
    }
}

fn api_key_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Marker extractor for `/internal/*` routes: the caller presented the shared API key.
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = AuthServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match header_str(&parts.headers, INTERNAL_API_KEY_HEADER) {
            Some(key) if api_key_matches(key, &state.config.internal_api_key) => Ok(Self),
            _ => {
                tracing::warn!("internal route called without a valid api key");
                Err(AuthServiceError::InvalidToken)
            }
        }
    }
}
