use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

/// Handler for `GET /healthz`: the process is up.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Result of a `GET /readyz` probe. 200 when every dependency check passed, else 503.
///
/// ```
/// use tollgate_core::health::Readiness;
///
/// let report = Readiness::default()
///     .check("database", Ok(()))
///     .check("redis", Err("connection refused".to_string()));
/// assert!(!report.is_ready());
/// ```
#[derive(Debug, Default)]
pub struct Readiness {
    checks: Vec<(&'static str, Result<(), String>)>,
}

impl Readiness {
    pub fn check(mut self, name: &'static str, outcome: Result<(), String>) -> Self {
        if let Err(ref e) = outcome {
            tracing::warn!(dependency = name, error = %e, "readiness check failed");
        }
        self.checks.push((name, outcome));
        self
    }

    pub fn is_ready(&self) -> bool {
        self.checks.iter().all(|(_, outcome)| outcome.is_ok())
    }
}

impl IntoResponse for Readiness {
    fn into_response(self) -> Response {
        let status = if self.is_ready() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        let checks: Map<String, Value> = self
            .checks
            .into_iter()
            .map(|(name, outcome)| {
                let state = if outcome.is_ok() { "up" } else { "down" };
                (name.to_string(), Value::from(state))
            })
            .collect();
        (status, Json(Value::Object(checks))).into_response()
    }
}
