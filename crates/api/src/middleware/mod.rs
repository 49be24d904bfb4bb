//! Request middleware.
//!
//! - [`auth::AuthUser`] -- extracts the authenticated user from a JWT Bearer token.
//! - [`rate_limit`] -- fixed-window throttling applied per route.
//! - [`client_ip`] -- best-effort client address resolution shared by both.

pub mod auth;
pub mod client_ip;
pub mod rate_limit;
