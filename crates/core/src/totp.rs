//! Time-based one-time-password second factor.
//!
//! Codes are derived RFC-6238 style: the Unix time divided into 30-second
//! steps feeds an HMAC keyed with the per-user secret, and dynamic
//! truncation yields a 6-digit code. One step of clock drift is accepted in
//! either direction. Secrets are 20 random bytes, base64-encoded for
//! storage; provisioning-URI/QR rendering is a caller concern.

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::types::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Length of a generated secret in raw bytes.
pub const SECRET_LENGTH: usize = 20;

/// Step length in seconds.
pub const STEP_SECS: i64 = 30;

/// Number of digits in a code.
pub const DIGITS: u32 = 6;

/// Steps of clock drift accepted on either side of now.
pub const DRIFT_STEPS: i64 = 1;

/// Generate a fresh base64-encoded secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LENGTH];
    rand::rng().fill_bytes(&mut bytes);
    Base64::encode_string(&bytes)
}

/// Compute the code for the given moment. Returns `None` if the stored
/// secret is not valid base64.
pub fn code_at(secret: &str, at: Timestamp) -> Option<String> {
    let key = Base64::decode_vec(secret).ok()?;
    let step = at.timestamp().div_euclid(STEP_SECS);
    Some(format_code(hotp(&key, step as u64)))
}

/// Check a submitted code against the secret, accepting [`DRIFT_STEPS`]
/// steps of drift. A malformed secret or code verifies as `false`.
pub fn verify_code(secret: &str, code: &str, now: Timestamp) -> bool {
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(key) = Base64::decode_vec(secret) else {
        return false;
    };

    let current_step = now.timestamp().div_euclid(STEP_SECS);
    (-DRIFT_STEPS..=DRIFT_STEPS).any(|drift| {
        let step = current_step + drift;
        step >= 0 && format_code(hotp(&key, step as u64)) == code
    })
}

/// HMAC-based one-time password for a single counter value (RFC 4226
/// dynamic truncation, 31-bit output).
fn hotp(key: &[u8], counter: u64) -> u32 {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    binary % 10u32.pow(DIGITS)
}

fn format_code(value: u32) -> String {
    format!("{value:0width$}", width = DIGITS as usize)
}
