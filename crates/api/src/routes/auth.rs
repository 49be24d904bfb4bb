//! Routes for the `/auth` resource, with per-route throttling policies.

use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use gatehouse_core::rate_limit::{RateKeyBy, RateLimitPolicy};

use crate::handlers;
use crate::middleware::rate_limit::{enforce, RateLimitContext};
use crate::state::AppState;

/// Login attempts: 5 per minute per source IP.
const LOGIN_LIMIT: RateLimitPolicy =
    RateLimitPolicy::new(5, Duration::from_secs(60), RateKeyBy::Ip);

/// Token refresh: 10 per minute per source IP.
const REFRESH_LIMIT: RateLimitPolicy =
    RateLimitPolicy::new(10, Duration::from_secs(60), RateKeyBy::Ip);

/// Password changes: 3 per 5 minutes per authenticated user.
const CHANGE_PASSWORD_LIMIT: RateLimitPolicy =
    RateLimitPolicy::new(3, Duration::from_secs(300), RateKeyBy::User);

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/auth/login",
            post(handlers::auth::login).route_layer(from_fn_with_state(
                RateLimitContext::new(state.clone(), LOGIN_LIMIT),
                enforce,
            )),
        )
        .route(
            "/auth/refresh",
            post(handlers::auth::refresh).route_layer(from_fn_with_state(
                RateLimitContext::new(state.clone(), REFRESH_LIMIT),
                enforce,
            )),
        )
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/auth/change-password",
            post(handlers::auth::change_password).route_layer(from_fn_with_state(
                RateLimitContext::new(state.clone(), CHANGE_PASSWORD_LIMIT),
                enforce,
            )),
        )
        .route("/auth/2fa/enable", post(handlers::auth::enable_two_factor))
}
