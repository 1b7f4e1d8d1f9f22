use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{Span, info_span};

use tollgate_core::health::healthz;
use tollgate_core::middleware::{
    REQUEST_ID_HEADER, propagate_request_id_layer, request_id_layer,
};

use crate::handlers::{
    health::readyz,
    internal::{resolve_or_create_user, run_cleanup},
    otp::{send_otp, verify_otp},
    passkey::{passkey_login, set_passkey},
    token::{logout, refresh},
    user::{get_me, update_me},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // OTP
        .route("/auth/otp/send", post(send_otp))
        .route("/auth/otp/verify", post(verify_otp))
        // Passkey
        .route("/auth/passkey/login", post(passkey_login))
        .route("/auth/passkey/set", post(set_passkey))
        // Session
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me).patch(update_me))
        // Service-to-service
        .route("/internal/users/resolve-or-create", post(resolve_or_create_user))
        .route("/internal/cleanup", post(run_cleanup))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(propagate_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .with_state(state)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
