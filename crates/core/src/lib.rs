//! Domain logic for the gatehouse authorization server.
//!
//! This crate has zero internal dependencies so it can be used by the API
//! layer, the repository layer, and any future worker or CLI tooling.
//!
//! - [`clock`] -- injectable time source.
//! - [`lockout`] -- progressive account-lockout policy.
//! - [`login`] -- login outcome vocabulary (tagged variants, not flags).
//! - [`rate_limit`] -- fixed-window request counter and store contract.
//! - [`totp`] -- time-based one-time-password second factor.
//! - [`audit`] -- audit action/resource name constants.
//! - [`hashing`] -- shared SHA-256 digest helper.

pub mod audit;
pub mod clock;
pub mod error;
pub mod hashing;
pub mod lockout;
pub mod login;
pub mod rate_limit;
pub mod totp;
pub mod types;
