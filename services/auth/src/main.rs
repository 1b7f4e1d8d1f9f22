use std::sync::Arc;
use std::time::Duration;

use sea_orm::Database;
use tracing::info;

use tollgate_auth::config::AuthConfig;
use tollgate_auth::infra::hash::Argon2Hasher;
use tollgate_auth::jobs::spawn_sweeper;
use tollgate_auth::router::build_router;
use tollgate_auth::state::AppState;
use tollgate_auth_types::token::TokenVerifier;
use tollgate_core::config::Config;
use tollgate_core::tracing::init_tracing;
use tollgate_domain::clock::{Clock, SystemClock};
use tollgate_domain::id::IdGenerator;

#[tokio::main]
async fn main() {
    init_tracing("info,sqlx=warn");

    let config = AuthConfig::from_env().expect("invalid auth configuration");

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.outbound_timeout_secs))
        .build()
        .expect("failed to build HTTP client");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState {
        db,
        redis,
        http,
        ids: Arc::new(IdGenerator::new(Arc::clone(&clock))),
        hasher: Arc::new(Argon2Hasher::default()),
        verifier: TokenVerifier::new(&config.jwt_secret, Arc::clone(&clock)),
        clock,
        config: Arc::new(config),
    };

    let sweeper = spawn_sweeper(
        state.clone(),
        Duration::from_secs(state.config.sweep_interval_secs),
    );

    let addr = format!("0.0.0.0:{}", state.config.auth_port);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("auth service listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("Gracefully shutdown");
        })
        .await
        .expect("server error");

    sweeper.abort();
}
