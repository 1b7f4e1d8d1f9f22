//! JWT claim shapes, signing and validation.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
#[cfg(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test))]
use serde::Serialize;
use serde::de::DeserializeOwned;
use tollgate_domain::clock::Clock;
use tollgate_domain::user::UserRole;
use uuid::Uuid;

/// User identity extracted from a validated access token.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub user_id: Uuid,
    pub phone: String,
    pub role: UserRole,
    pub expires_at: i64,
}

/// Errors returned by token validation and signing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("failed to sign token")]
    Signing,
}

/// Access-token payload.
///
/// | Field | JWT claim | Meaning |
/// |-------|-----------|---------|
/// | `sub` | `sub` | user ID (UUID string) |
/// | `phone` | custom | E.164 phone at issue time |
/// | `role` | custom | `"USER"` / `"ADMIN"` |
/// | `iat` / `exp` | `iat` / `exp` | seconds since epoch |
///
/// [`Serialize`] requires the **`USE_ONLY_IN_AUTH_SERVICE`** feature: only the auth service
/// issues tokens.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test), derive(Serialize))]
pub struct AccessClaims {
    pub sub: String,
    pub phone: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// Refresh-token payload. `jti` keeps two tokens minted in the same second distinct.
///
/// The claim sets are disjoint enough that an access token never decodes as a refresh
/// token and vice versa.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test), derive(Serialize))]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

trait Expiring {
    fn exp(&self) -> i64;
}

impl Expiring for AccessClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

impl Expiring for RefreshClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

// ── Core decode (private) ────────────────────────────────────────────────

/// HS256, required claims `sub` + `iat` + `exp`. Expiry is checked against the
/// injected clock rather than the system time, with no leeway.
fn decode_jwt<T>(token: &str, secret: &str, now: i64) -> Result<T, AuthError>
where
    T: DeserializeOwned + Expiring,
{
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);

    let data = decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
    })?;

    if data.claims.exp() <= now {
        return Err(AuthError::Expired);
    }
    Ok(data.claims)
}

// ── Public: all consumers ────────────────────────────────────────────────

/// Validates tokens against a shared secret and clock.
///
/// Cheap to clone. Services expose it through `FromRef` so that
/// [`AuthenticatedUser`](crate::identity::AuthenticatedUser) can extract it.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<str>,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: Arc::from(secret),
            clock,
        }
    }

    /// Validate an access token, returning the identity it carries.
    pub fn verify_access(&self, token: &str) -> Result<TokenInfo, AuthError> {
        let claims: AccessClaims = decode_jwt(token, &self.secret, self.clock.now().timestamp())?;
        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AuthError::Malformed)?;
        Ok(TokenInfo {
            user_id,
            phone: claims.phone,
            role: claims.role,
            expires_at: claims.exp,
        })
    }

    /// Validate a refresh token's signature and expiry. Whether it is still live is a
    /// storage question the caller answers afterwards.
    #[cfg(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test))]
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        decode_jwt(token, &self.secret, self.clock.now().timestamp())
    }
}

// ── Feature-gated: auth service only ─────────────────────────────────────

/// Sign claims with HS256.
#[cfg(any(feature = "USE_ONLY_IN_AUTH_SERVICE", test))]
pub fn sign_token<T: Serialize>(claims: &T, secret: &str) -> Result<String, AuthError> {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::Signing)
}
