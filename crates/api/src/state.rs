use std::sync::Arc;

use gatehouse_core::clock::Clock;
use gatehouse_core::rate_limit::CounterStore;

use crate::config::ServerConfig;
use crate::service::{AuditSink, AuthService, PgAuditSink, PgCredentialStore, TokenService};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: gatehouse_db::DbPool,
    /// Server configuration (JWT settings included).
    pub config: Arc<ServerConfig>,
    /// Injected time source; tests swap in a manual clock.
    pub clock: Arc<dyn Clock>,
    /// Shared counter store backing the rate limiter.
    pub counters: Arc<dyn CounterStore>,
    /// Fire-and-forget audit event sink.
    pub audit: Arc<dyn AuditSink>,
    /// Login orchestrator wired to the Postgres collaborators.
    pub auth: AuthService,
}

impl AppState {
    /// Wire the service graph for the given pool, config, clock, and
    /// counter store.
    pub fn new(
        pool: gatehouse_db::DbPool,
        config: Arc<ServerConfig>,
        clock: Arc<dyn Clock>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        let credentials = Arc::new(PgCredentialStore::new(pool.clone(), clock.clone()));
        let tokens = Arc::new(TokenService::new(
            pool.clone(),
            config.jwt.clone(),
            clock.clone(),
        ));
        let audit: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(pool.clone()));
        let auth = AuthService::new(credentials, tokens, audit.clone(), clock.clone());

        Self {
            pool,
            config,
            clock,
            counters,
            audit,
            auth,
        }
    }
}
