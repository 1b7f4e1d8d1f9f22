//! Bearer access-token extractor.

use axum::Json;
use axum::extract::{FromRef, FromRequestParts};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use http::StatusCode;
use http::request::Parts;
use tollgate_domain::user::UserRole;
use uuid::Uuid;

use crate::token::{AuthError, TokenVerifier};

/// Caller identity taken from `Authorization: Bearer <access token>`.
///
/// Requires the router state to provide a [`TokenVerifier`] via `FromRef`.
/// Rejects with 401 `INVALID_TOKEN` when the header is missing or the token fails validation.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub phone: String,
    pub role: UserRole,
}

#[derive(Debug)]
pub struct AuthRejection {
    message: &'static str,
}

impl AuthRejection {
    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl From<AuthError> for AuthRejection {
    fn from(e: AuthError) -> Self {
        let message = match e {
            AuthError::Expired => "access token expired",
            _ => "invalid access token",
        };
        Self { message }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "kind": "INVALID_TOKEN",
            "message": self.message,
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    // Validation is synchronous; resolve it before the returned future so the future
    // borrows nothing from `parts` or `state`.
    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let verifier = TokenVerifier::from_ref(state);
        let result = match parts.headers.typed_get::<Authorization<Bearer>>() {
            Some(Authorization(bearer)) => verifier.verify_access(bearer.token()).map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                AuthRejection::from(e)
            }),
            None => Err(AuthRejection {
                message: "missing bearer token",
            }),
        };

        async move {
            let info = result?;
            Ok(Self {
                user_id: info.user_id,
                phone: info.phone,
                role: info.role,
            })
        }
    }
}
