//! Fixed-window rate limiting applied per route.
//!
//! A throttled request is rejected before it reaches the handler: no domain
//! state is mutated and no domain audit event is written. The throttle
//! itself is logged at this layer.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gatehouse_core::rate_limit::{check_and_count, RateDecision, RateKeyBy, RateLimitPolicy};
use serde_json::json;

use crate::auth::jwt::validate_token;
use crate::middleware::client_ip;
use crate::state::AppState;

/// State handed to [`enforce`] per protected route.
#[derive(Clone)]
pub struct RateLimitContext {
    pub state: AppState,
    pub policy: RateLimitPolicy,
}

impl RateLimitContext {
    pub fn new(state: AppState, policy: RateLimitPolicy) -> Self {
        Self { state, policy }
    }
}

/// Middleware entry point for `axum::middleware::from_fn_with_state`.
pub async fn enforce(State(ctx): State<RateLimitContext>, req: Request, next: Next) -> Response {
    let route = req.uri().path().to_string();
    let identity = derive_identity(&ctx, &req);

    match check_and_count(ctx.state.counters.as_ref(), &ctx.policy, &route, &identity).await {
        Ok(RateDecision::Allowed) => next.run(req).await,
        Ok(RateDecision::Throttled) => {
            tracing::warn!(%route, %identity, "Rate limit exceeded");
            throttled_response()
        }
        Err(error) => crate::error::AppError::Core(error).into_response(),
    }
}

/// Derive the identity part of the counter key per the route's policy.
///
/// Unauthenticated or unidentifiable callers fold into shared buckets
/// (`unknown` / `anonymous`) rather than bypassing the limiter.
fn derive_identity(ctx: &RateLimitContext, req: &Request) -> String {
    match ctx.policy.key_by {
        RateKeyBy::Ip => client_ip_of(req).unwrap_or_else(|| "unknown".to_string()),
        RateKeyBy::User => {
            authenticated_subject(ctx, req).unwrap_or_else(|| "anonymous".to_string())
        }
        RateKeyBy::IpAndUser => {
            let ip = client_ip_of(req).unwrap_or_else(|| "unknown".to_string());
            let user = authenticated_subject(ctx, req).unwrap_or_else(|| "anonymous".to_string());
            format!("{ip}_{user}")
        }
    }
}

fn client_ip_of(req: &Request) -> Option<String> {
    client_ip::from_headers(req.headers()).or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

/// Identify the caller from a bearer token, if one validates.
fn authenticated_subject(ctx: &RateLimitContext, req: &Request) -> Option<String> {
    let header = req.headers().get("authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    let claims = validate_token(token, &ctx.state.config.jwt).ok()?;
    Some(claims.sub.to_string())
}

fn throttled_response() -> Response {
    let body = json!({
        "error": "Too many requests. Please try again later.",
        "code": "RATE_LIMITED",
    });
    (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response()
}
