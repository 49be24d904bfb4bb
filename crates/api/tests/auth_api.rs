//! HTTP-level integration tests for the auth endpoints.
//!
//! Covers login outcomes, account lockout, the second-factor gate,
//! per-route rate limiting, current-identity lookup, password changes, and
//! the audit trail.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, create_test_user, get_auth, grant_role, login_user, post_json,
    post_json_auth, post_json_from, TEST_PASSWORD,
};
use gatehouse_core::audit::actions;
use gatehouse_core::clock::Clock;
use gatehouse_core::totp;
use gatehouse_db::repositories::{AuditRepo, UserRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Login outcomes
// ---------------------------------------------------------------------------

/// Successful login returns 200 with tokens and the caller's identity.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_success(pool: PgPool) {
    let user = create_test_user(&pool, "loginuser").await;
    grant_role(&pool, user.id, "admin", "users.manage").await;
    let harness = build_test_app(pool);

    let json = login_user(harness.app, "loginuser@test.com", TEST_PASSWORD, "10.1.0.1").await;

    assert!(json["access_token"].is_string(), "response must contain access_token");
    assert!(json["refresh_token"].is_string(), "response must contain refresh_token");
    assert!(json["expires_at"].is_string(), "response must contain expires_at");
    assert_eq!(json["user"]["id"], user.id);
    assert_eq!(json["user"]["email"], "loginuser@test.com");
    assert_eq!(json["user"]["roles"], serde_json::json!(["admin"]));
    assert_eq!(json["user"]["permissions"], serde_json::json!(["users.manage"]));
}

/// Email lookup is case-insensitive.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_email_case_insensitive(pool: PgPool) {
    create_test_user(&pool, "caseuser").await;
    let harness = build_test_app(pool);

    let json = login_user(harness.app, "CaseUser@Test.com", TEST_PASSWORD, "10.1.0.2").await;
    assert!(json["access_token"].is_string());
}

/// Wrong password, unknown email, and deactivated account all return 401
/// with the same machine-readable code.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_failures_are_indistinguishable(pool: PgPool) {
    let user = create_test_user(&pool, "probe").await;
    sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
    create_test_user(&pool, "present").await;
    let harness = build_test_app(pool);

    let cases = [
        ("present@test.com", "Wrong_password_1!"),
        ("ghost@test.com", "Wrong_password_1!"),
        ("probe@test.com", TEST_PASSWORD),
    ];

    let mut codes = Vec::new();
    for (i, (email, password)) in cases.iter().enumerate() {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = post_json_from(
            harness.app.clone(),
            "/api/v1/auth/login",
            body,
            &format!("10.2.0.{i}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        codes.push(body_json(response).await["code"].clone());
    }

    assert_eq!(codes[0], codes[1]);
    assert_eq!(codes[1], codes[2]);
}

/// Malformed input never reaches the orchestrator: 400 with a message list.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_validation_failure(pool: PgPool) {
    let harness = build_test_app(pool);

    let body = serde_json::json!({ "email": "not-an-email", "password": "short" });
    let response = post_json(harness.app, "/api/v1/auth/login", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    let errors = json["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e.as_str().unwrap().contains("Email")));
    assert!(errors.iter().any(|e| e.as_str().unwrap().contains("Password")));
}

// ---------------------------------------------------------------------------
// Lockout
// ---------------------------------------------------------------------------

/// Five wrong passwords lock the account; the correct password then bounces
/// off the gate until the window lapses.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_lockout_after_five_failures(pool: PgPool) {
    let user = create_test_user(&pool, "lockme").await;
    let harness = build_test_app(pool.clone());

    for i in 0..5 {
        let body =
            serde_json::json!({ "email": "lockme@test.com", "password": "Wrong_password_1!" });
        let response = post_json_from(
            harness.app.clone(),
            "/api/v1/auth/login",
            body,
            &format!("10.3.0.{i}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let stored = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(stored.login_attempts, 0, "attempts reset when the window opens");
    assert_eq!(stored.lockout_count, 1);
    // Second-level comparison: timestamptz round-trips at microsecond
    // precision.
    let lockout_end = stored.lockout_end_at.expect("lockout window must be open");
    let expected = harness.clock.now() + chrono::Duration::minutes(5);
    assert_eq!(lockout_end.timestamp(), expected.timestamp());

    // Correct password while locked still fails.
    let body = serde_json::json!({ "email": "lockme@test.com", "password": TEST_PASSWORD });
    let response =
        post_json_from(harness.app.clone(), "/api/v1/auth/login", body.clone(), "10.3.0.9").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // After the window lapses the same credentials work, and success clears
    // the bookkeeping.
    harness
        .clock
        .advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
    let response = post_json_from(harness.app, "/api/v1/auth/login", body, "10.3.0.10").await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(stored.lockout_count, 0);
    assert_eq!(stored.lockout_end_at, None);
    assert!(stored.last_login_at.is_some());
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// The 6th login attempt within a minute from one address is throttled
/// before it reaches the login flow.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_rate_limit_per_ip(pool: PgPool) {
    let user = create_test_user(&pool, "throttled").await;
    let harness = build_test_app(pool.clone());

    let body = serde_json::json!({ "email": "throttled@test.com", "password": "Wrong_password_1!" });
    for _ in 0..5 {
        let response = post_json_from(
            harness.app.clone(),
            "/api/v1/auth/login",
            body.clone(),
            "10.4.0.1",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = post_json_from(
        harness.app.clone(),
        "/api/v1/auth/login",
        body.clone(),
        "10.4.0.1",
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["code"], "RATE_LIMITED");

    // Throttled requests never reach the login flow: the attempt counter
    // still shows only the five allowed failures.
    let stored = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(stored.login_attempts, 0);
    assert_eq!(stored.lockout_count, 1, "five real attempts, not six");

    // A different source address is unaffected.
    let response =
        post_json_from(harness.app.clone(), "/api/v1/auth/login", body, "10.4.0.2").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A fresh window restarts the count.
    harness.clock.advance(chrono::Duration::seconds(61));
    let ok_body = serde_json::json!({ "email": "throttled@test.com", "password": TEST_PASSWORD });
    let response = post_json_from(harness.app, "/api/v1/auth/login", ok_body, "10.4.0.1").await;
    assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

// ---------------------------------------------------------------------------
// Second factor
// ---------------------------------------------------------------------------

/// Enrolment returns the secret; the next password-only login is a pending
/// challenge, and a valid one-time code completes it.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_two_factor_enrolment_and_login(pool: PgPool) {
    create_test_user(&pool, "totpuser").await;
    let harness = build_test_app(pool.clone());

    // Enrol while authenticated.
    let login = login_user(
        harness.app.clone(),
        "totpuser@test.com",
        TEST_PASSWORD,
        "10.5.0.1",
    )
    .await;
    let access = login["access_token"].as_str().unwrap();

    let response = post_json_auth(
        harness.app.clone(),
        "/api/v1/auth/2fa/enable",
        serde_json::json!({}),
        access,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let secret = body_json(response).await["secret"].as_str().unwrap().to_string();

    // Password alone now yields the pending challenge, not tokens.
    let body = serde_json::json!({ "email": "totpuser@test.com", "password": TEST_PASSWORD });
    let response =
        post_json_from(harness.app.clone(), "/api/v1/auth/login", body, "10.5.0.2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["requires_two_factor"], true);
    assert!(json.get("access_token").is_none(), "no tokens alongside a challenge");

    // A wrong code is rejected with the shared failure code.
    let body = serde_json::json!({
        "email": "totpuser@test.com",
        "password": TEST_PASSWORD,
        "two_factor_code": "000000",
    });
    let response =
        post_json_from(harness.app.clone(), "/api/v1/auth/login", body, "10.5.0.3").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The current code completes the login.
    let code = totp::code_at(&secret, harness.clock.now()).unwrap();
    let body = serde_json::json!({
        "email": "totpuser@test.com",
        "password": TEST_PASSWORD,
        "two_factor_code": code,
    });
    let response =
        post_json_from(harness.app.clone(), "/api/v1/auth/login", body, "10.5.0.4").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["access_token"].is_string());
}

// ---------------------------------------------------------------------------
// Current identity
// ---------------------------------------------------------------------------

/// `GET /auth/me` returns the caller's profile with roles and permissions.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_me_returns_identity(pool: PgPool) {
    let user = create_test_user(&pool, "whoami").await;
    grant_role(&pool, user.id, "reviewer", "reports.read").await;
    let harness = build_test_app(pool);

    let login = login_user(
        harness.app.clone(),
        "whoami@test.com",
        TEST_PASSWORD,
        "10.6.0.1",
    )
    .await;
    let access = login["access_token"].as_str().unwrap();

    let response = get_auth(harness.app, "/api/v1/auth/me", access).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], user.id);
    assert_eq!(json["email"], "whoami@test.com");
    assert_eq!(json["roles"], serde_json::json!(["reviewer"]));
    assert_eq!(json["permissions"], serde_json::json!(["reports.read"]));
    assert!(json.get("password_hash").is_none(), "secrets never serialize");
}

/// Requests without a valid token are rejected.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_me_requires_auth(pool: PgPool) {
    let harness = build_test_app(pool);

    let response = get_auth(harness.app.clone(), "/api/v1/auth/me", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Change password
// ---------------------------------------------------------------------------

/// Changing the password invalidates the old one for future logins.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_change_password_flow(pool: PgPool) {
    create_test_user(&pool, "rotator").await;
    let harness = build_test_app(pool);

    let login = login_user(
        harness.app.clone(),
        "rotator@test.com",
        TEST_PASSWORD,
        "10.7.0.1",
    )
    .await;
    let access = login["access_token"].as_str().unwrap();

    let body = serde_json::json!({
        "current_password": TEST_PASSWORD,
        "new_password": "Fresh_password_9?",
        "confirm_password": "Fresh_password_9?",
    });
    let response = post_json_auth(
        harness.app.clone(),
        "/api/v1/auth/change-password",
        body,
        access,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old password no longer works; the new one does.
    let body = serde_json::json!({ "email": "rotator@test.com", "password": TEST_PASSWORD });
    let response =
        post_json_from(harness.app.clone(), "/api/v1/auth/login", body, "10.7.0.2").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = login_user(
        harness.app,
        "rotator@test.com",
        "Fresh_password_9?",
        "10.7.0.3",
    )
    .await;
    assert!(json["access_token"].is_string());
}

/// A wrong current password or a weak replacement comes back as a 400 with
/// the violated rules listed.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_change_password_rejections(pool: PgPool) {
    create_test_user(&pool, "stubborn").await;
    let harness = build_test_app(pool);

    let login = login_user(
        harness.app.clone(),
        "stubborn@test.com",
        TEST_PASSWORD,
        "10.8.0.1",
    )
    .await;
    let access = login["access_token"].as_str().unwrap();

    let weak = serde_json::json!({
        "current_password": TEST_PASSWORD,
        "new_password": "weak",
        "confirm_password": "weak",
    });
    let response = post_json_auth(
        harness.app.clone(),
        "/api/v1/auth/change-password",
        weak,
        access,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["errors"].as_array().unwrap().len() >= 2);

    let wrong_current = serde_json::json!({
        "current_password": "Not_the_password_1!",
        "new_password": "Fresh_password_9?",
        "confirm_password": "Fresh_password_9?",
    });
    let response = post_json_auth(
        harness.app.clone(),
        "/api/v1/auth/change-password",
        wrong_current,
        access,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// Every login branch leaves an audit event; successes carry the user id.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_audit_trail(pool: PgPool) {
    let user = create_test_user(&pool, "audited").await;
    let harness = build_test_app(pool.clone());

    let wrong = serde_json::json!({ "email": "audited@test.com", "password": "Wrong_password_1!" });
    post_json_from(harness.app.clone(), "/api/v1/auth/login", wrong, "10.9.0.1").await;
    login_user(harness.app, "audited@test.com", TEST_PASSWORD, "10.9.0.2").await;

    let events = AuditRepo::list_recent_for_action(&pool, actions::LOGIN, 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);

    let success = events.iter().find(|e| e.success).expect("success event");
    assert_eq!(success.user_id, Some(user.id));
    assert_eq!(success.resource, "Authentication");
    assert_eq!(success.ip_address.as_deref(), Some("10.9.0.2"));

    let failure = events.iter().find(|e| !e.success).expect("failure event");
    assert!(failure.error_message.is_some(), "failures carry an error message");
}
