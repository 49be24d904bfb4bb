//! Fixed-window request rate limiting.
//!
//! Counters are keyed by `(route, identity-selector)` and live in a shared
//! [`CounterStore`] (an in-memory implementation ships here; a distributed
//! cache implements the same contract in a multi-node deployment). The first
//! request in a fresh window writes count 1 with a TTL equal to the window
//! length; later requests increment the value without moving the deadline,
//! so the window is fixed rather than sliding. The read and the write are
//! two operations and are tolerated to race: a small overcount under heavy
//! concurrency is accepted in exchange for a plain get/set store contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::types::Timestamp;

/// Shared counter store contract.
///
/// `set_with_ttl` binds the TTL only when the key is absent (or its previous
/// window has lapsed); writes to a live key update the value and leave the
/// deadline untouched.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>, CoreError>;
    async fn set_with_ttl(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CoreError>;
}

/// How the per-client identity part of a counter key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKeyBy {
    /// Source IP address.
    Ip,
    /// Authenticated identity (falls back to `anonymous`).
    User,
    /// Both, concatenated.
    IpAndUser,
}

/// Limit configuration for one protected operation.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_requests: i64,
    pub window: Duration,
    pub key_by: RateKeyBy,
}

impl RateLimitPolicy {
    pub const fn new(max_requests: i64, window: Duration, key_by: RateKeyBy) -> Self {
        Self {
            max_requests,
            window,
            key_by,
        }
    }
}

/// Verdict for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Throttled,
}

/// Build the store key for a `(route, identity)` pair.
pub fn counter_key(route: &str, identity: &str) -> String {
    format!("rate_limit:{route}:{identity}")
}

/// Count one request against the window, returning whether it may proceed.
///
/// A request that would push the count past `max_requests` is throttled and
/// does not increment the counter.
pub async fn check_and_count(
    store: &dyn CounterStore,
    policy: &RateLimitPolicy,
    route: &str,
    identity: &str,
) -> Result<RateDecision, CoreError> {
    let key = counter_key(route, identity);
    let current = store.get(&key).await?.unwrap_or(0);
    if current >= policy.max_requests {
        return Ok(RateDecision::Throttled);
    }
    store.set_with_ttl(&key, current + 1, policy.window).await?;
    Ok(RateDecision::Allowed)
}

/// In-process [`CounterStore`] backed by a mutex-guarded map.
///
/// Entries are evicted lazily when read after their deadline.
pub struct MemoryCounterStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CounterEntry>>,
}

struct CounterEntry {
    value: i64,
    expires_at: Timestamp,
}

impl MemoryCounterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value)),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CoreError> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CoreError::Unavailable(format!("counter TTL out of range: {e}")))?;

        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            // Live window: update the count, keep the existing deadline.
            Some(entry) if entry.expires_at > now => {
                entry.value = value;
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    CounterEntry {
                        value,
                        expires_at: now + ttl,
                    },
                );
            }
        }
        Ok(())
    }
}
