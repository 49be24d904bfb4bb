//! Shared SHA-256 hex digest utility.
//!
//! Used by the token engine to digest opaque refresh-token values before
//! storage, so a database leak does not compromise live sessions.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}
