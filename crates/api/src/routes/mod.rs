//! Route tree construction.
//!
//! ```text
//! /health                          liveness probe
//!
//! /api/v1/auth/login               login (public, 5/min per IP)
//! /api/v1/auth/refresh             refresh (public, 10/min per IP)
//! /api/v1/auth/logout              logout (requires auth)
//! /api/v1/auth/me                  current identity (requires auth)
//! /api/v1/auth/change-password     change password (auth, 3 per 5 min per user)
//! /api/v1/auth/2fa/enable          enrol second factor (requires auth)
//! ```

pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// The state is taken by reference because rate-limited routes capture a
/// clone of it inside their middleware.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new().merge(auth::router(state))
}
