//! Shared harness for HTTP-level integration tests.
//!
//! Builds the full application router with the production middleware stack
//! (CORS, request ID, timeout, tracing, panic recovery, per-route rate
//! limits) on top of a test database pool, a manual clock, and an in-memory
//! counter store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use gatehouse_api::auth::jwt::JwtConfig;
use gatehouse_api::auth::password::hash_password;
use gatehouse_api::config::ServerConfig;
use gatehouse_api::router::build_app_router;
use gatehouse_api::state::AppState;
use gatehouse_core::clock::ManualClock;
use gatehouse_core::rate_limit::MemoryCounterStore;
use gatehouse_db::models::user::{CreateUser, User};
use gatehouse_db::repositories::{RoleRepo, UserRepo};

/// Plaintext password used by every seeded test user.
pub const TEST_PASSWORD: &str = "Test_password_123!";

/// The app under test plus the handles the tests poke at.
pub struct TestApp {
    pub app: Router,
    pub clock: Arc<ManualClock>,
    pub config: ServerConfig,
}

/// Build a test `ServerConfig` with safe defaults and a known JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret-that-is-long-enough".to_string(),
            issuer: "gatehouse".to_string(),
            audience: "gatehouse-clients".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
    }
}

/// Build the full application router for the given database pool.
///
/// The clock starts at the real current time (issued JWTs must validate
/// against the wall clock) but can be advanced by tests to expire refresh
/// tokens and rate-limit windows.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let config = test_config();
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let counters = Arc::new(MemoryCounterStore::new(clock.clone()));

    let state = AppState::new(pool, Arc::new(config.clone()), clock.clone(), counters);
    let app = build_app_router(state, &config);

    TestApp { app, clock, config }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// POST a JSON body to the given URI.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a JSON body with a spoofed client address (rate-limit keys derive
/// from `x-forwarded-for` in tests).
pub async fn post_json_from(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    ip: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a JSON body with a Bearer token.
pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET with a Bearer token.
pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

// ---------------------------------------------------------------------------
// Seeding helpers
// ---------------------------------------------------------------------------

/// Create a test user directly in the database. The password is
/// [`TEST_PASSWORD`].
pub async fn create_test_user(pool: &PgPool, username: &str) -> User {
    let hashed = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    let input = CreateUser {
        username: username.to_string(),
        email: format!("{username}@test.com"),
        password_hash: hashed,
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

/// Seed a role carrying one permission and assign it to the user.
pub async fn grant_role(pool: &PgPool, user_id: i64, role: &str, permission: &str) {
    sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO permissions (full_permission) VALUES ($1)
         ON CONFLICT (full_permission) DO NOTHING",
    )
    .bind(permission)
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id)
         SELECT r.id, p.id FROM roles r, permissions p
         WHERE r.name = $1 AND p.full_permission = $2
         ON CONFLICT DO NOTHING",
    )
    .bind(role)
    .bind(permission)
    .execute(pool)
    .await
    .unwrap();

    let role_row = RoleRepo::find_by_name(pool, role)
        .await
        .unwrap()
        .expect("role was just seeded");
    RoleRepo::assign_to_user(pool, user_id, role_row.id)
        .await
        .unwrap();
}

/// Log in via the API (unique source IP per call so the login rate limit
/// never interferes) and return the response JSON.
pub async fn login_user(app: Router, email: &str, password: &str, ip: &str) -> serde_json::Value {
    let body = serde_json::json!({ "email": email, "password": password });
    let response = post_json_from(app, "/api/v1/auth/login", body, ip).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}
