use axum::extract::State;

use tollgate_core::health::Readiness;

use crate::error::AuthServiceError;
use crate::infra::rate_limit;
use crate::state::AppState;

fn describe(e: AuthServiceError) -> String {
    match e {
        AuthServiceError::Internal(inner) => format!("{inner:#}"),
        other => other.to_string(),
    }
}

/// `GET /readyz`: database and Redis both answer.
pub async fn readyz(State(state): State<AppState>) -> Readiness {
    let database = state.db.ping().await.map_err(|e| e.to_string());
    let redis = rate_limit::ping(&state.redis).await.map_err(describe);
    Readiness::default()
        .check("database", database)
        .check("redis", redis)
}
