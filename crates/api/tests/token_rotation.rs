//! Integration tests for the refresh-token lifecycle: rotation, single-use
//! enforcement under concurrency, revocation, expiry, and the jti
//! correlation between the two halves of a credential pair.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, create_test_user, login_user, post_json_auth, post_json_from,
    TEST_PASSWORD,
};
use gatehouse_api::auth::jwt::{hash_refresh_token, validate_token};
use gatehouse_core::clock::Clock;
use gatehouse_db::repositories::RefreshTokenRepo;
use sqlx::PgPool;

/// Exchange a refresh token via the API from the given source address.
async fn refresh_from(
    app: axum::Router,
    token: &str,
    ip: &str,
) -> axum::http::Response<axum::body::Body> {
    let body = serde_json::json!({ "refresh_token": token });
    post_json_from(app, "/api/v1/auth/refresh", body, ip).await
}

/// A fresh access token's `jti` matches the correlation id stored on its
/// paired refresh-token record, and the stored record carries provenance.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_jti_correlates_access_and_refresh_tokens(pool: PgPool) {
    create_test_user(&pool, "paired").await;
    let harness = build_test_app(pool.clone());

    let login = login_user(
        harness.app,
        "paired@test.com",
        TEST_PASSWORD,
        "10.20.0.1",
    )
    .await;

    let claims = validate_token(
        login["access_token"].as_str().unwrap(),
        &harness.config.jwt,
    )
    .expect("issued token must validate");

    let stored = RefreshTokenRepo::find_by_hash(
        &pool,
        &hash_refresh_token(login["refresh_token"].as_str().unwrap()),
    )
    .await
    .unwrap()
    .expect("refresh record must exist");

    assert_eq!(stored.jwt_id, claims.jti);
    assert_eq!(stored.ip_address.as_deref(), Some("10.20.0.1"));
    assert!(!stored.is_used);
    assert!(!stored.is_revoked);

    // exp is exactly now + the configured access-token lifetime.
    assert_eq!(
        claims.exp,
        (harness.clock.now() + chrono::Duration::minutes(15)).timestamp()
    );
}

/// Refresh rotates the pair: the reply carries new values and the consumed
/// record is marked used.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_rotates_tokens(pool: PgPool) {
    create_test_user(&pool, "rotate").await;
    let harness = build_test_app(pool.clone());

    let login = login_user(
        harness.app.clone(),
        "rotate@test.com",
        TEST_PASSWORD,
        "10.21.0.1",
    )
    .await;
    let original_refresh = login["refresh_token"].as_str().unwrap();

    let response = refresh_from(harness.app.clone(), original_refresh, "10.21.0.2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;

    assert_ne!(rotated["refresh_token"], login["refresh_token"]);
    assert_ne!(rotated["access_token"], login["access_token"]);

    let consumed = RefreshTokenRepo::find_by_hash(&pool, &hash_refresh_token(original_refresh))
        .await
        .unwrap()
        .unwrap();
    assert!(consumed.is_used, "consumed record is marked used");
    assert!(
        !RefreshTokenRepo::is_active(&pool, &consumed.token_hash, harness.clock.now())
            .await
            .unwrap(),
        "a consumed token no longer reports active"
    );

    // The rotated token works exactly once in turn.
    let next = rotated["refresh_token"].as_str().unwrap();
    let response = refresh_from(harness.app, next, "10.21.0.3").await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// A spent token fails on replay; a third attempt fails identically.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_is_single_use(pool: PgPool) {
    create_test_user(&pool, "single").await;
    let harness = build_test_app(pool);

    let login = login_user(
        harness.app.clone(),
        "single@test.com",
        TEST_PASSWORD,
        "10.22.0.1",
    )
    .await;
    let refresh = login["refresh_token"].as_str().unwrap();

    let first = refresh_from(harness.app.clone(), refresh, "10.22.0.2").await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = refresh_from(harness.app.clone(), refresh, "10.22.0.3").await;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
    let second_body = body_json(second).await;

    let third = refresh_from(harness.app, refresh, "10.22.0.4").await;
    assert_eq!(third.status(), StatusCode::UNAUTHORIZED);
    let third_body = body_json(third).await;

    // Replay and garbage fail the same way.
    assert_eq!(second_body["code"], third_body["code"]);
}

/// Two concurrent refresh calls racing on one token value: exactly one
/// wins, the loser observes the same uniform rejection as any dead token.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_concurrent_refresh_has_single_winner(pool: PgPool) {
    create_test_user(&pool, "racer").await;
    let harness = build_test_app(pool);

    let login = login_user(
        harness.app.clone(),
        "racer@test.com",
        TEST_PASSWORD,
        "10.23.0.1",
    )
    .await;
    let refresh = login["refresh_token"].as_str().unwrap();

    let (a, b) = tokio::join!(
        refresh_from(harness.app.clone(), refresh, "10.23.0.2"),
        refresh_from(harness.app.clone(), refresh, "10.23.0.3"),
    );

    let statuses = [a.status(), b.status()];
    assert!(
        statuses.contains(&StatusCode::OK),
        "exactly one concurrent refresh must succeed, got {statuses:?}"
    );
    assert!(
        statuses.contains(&StatusCode::UNAUTHORIZED),
        "the losing refresh must observe an invalid token, got {statuses:?}"
    );
}

/// An unknown token value is rejected without leaking why.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_unknown_token(pool: PgPool) {
    let harness = build_test_app(pool);

    let response = refresh_from(harness.app, "completely-made-up", "10.24.0.1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "AUTHENTICATION_FAILED");
}

/// A refresh token expires with the configured lifetime.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_token_expires(pool: PgPool) {
    create_test_user(&pool, "expiry").await;
    let harness = build_test_app(pool);

    let login = login_user(
        harness.app.clone(),
        "expiry@test.com",
        TEST_PASSWORD,
        "10.25.0.1",
    )
    .await;
    let refresh = login["refresh_token"].as_str().unwrap();

    harness
        .clock
        .advance(chrono::Duration::days(7) + chrono::Duration::seconds(1));

    let response = refresh_from(harness.app, refresh, "10.25.0.2").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Logout with a token revokes that session only; logout without one
/// revokes everything the user holds.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_logout_revocation_scopes(pool: PgPool) {
    create_test_user(&pool, "sessions").await;
    let harness = build_test_app(pool.clone());

    // Two live sessions.
    let first = login_user(
        harness.app.clone(),
        "sessions@test.com",
        TEST_PASSWORD,
        "10.26.0.1",
    )
    .await;
    let second = login_user(
        harness.app.clone(),
        "sessions@test.com",
        TEST_PASSWORD,
        "10.26.0.2",
    )
    .await;

    // Targeted logout kills only the supplied session.
    let response = post_json_auth(
        harness.app.clone(),
        "/api/v1/auth/logout",
        serde_json::json!({ "refresh_token": first["refresh_token"] }),
        first["access_token"].as_str().unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let dead = refresh_from(
        harness.app.clone(),
        first["refresh_token"].as_str().unwrap(),
        "10.26.0.3",
    )
    .await;
    assert_eq!(dead.status(), StatusCode::UNAUTHORIZED);

    let alive = refresh_from(
        harness.app.clone(),
        second["refresh_token"].as_str().unwrap(),
        "10.26.0.4",
    )
    .await;
    assert_eq!(alive.status(), StatusCode::OK);
    let replacement = body_json(alive).await;

    // Logout-everywhere kills the remaining session.
    let response = post_json_auth(
        harness.app.clone(),
        "/api/v1/auth/logout",
        serde_json::json!({}),
        second["access_token"].as_str().unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let after = refresh_from(
        harness.app,
        replacement["refresh_token"].as_str().unwrap(),
        "10.26.0.5",
    )
    .await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);

    // Revocation metadata lands on the record.
    let revoked = RefreshTokenRepo::find_by_hash(
        &pool,
        &hash_refresh_token(replacement["refresh_token"].as_str().unwrap()),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(revoked.is_revoked);
    assert_eq!(
        revoked.revoked_reason.as_deref(),
        Some("User logout all sessions")
    );
    assert!(revoked.revoked_at.is_some());
}

/// Revoking an already-dead token is a quiet no-op.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_revoking_inactive_token_is_noop(pool: PgPool) {
    create_test_user(&pool, "noop").await;
    let harness = build_test_app(pool);

    let login = login_user(
        harness.app.clone(),
        "noop@test.com",
        TEST_PASSWORD,
        "10.27.0.1",
    )
    .await;
    let access = login["access_token"].as_str().unwrap();
    let refresh = login["refresh_token"].as_str().unwrap();

    // Spend the token, then try to revoke it twice via logout.
    let spent = refresh_from(harness.app.clone(), refresh, "10.27.0.2").await;
    assert_eq!(spent.status(), StatusCode::OK);

    for _ in 0..2 {
        let response = post_json_auth(
            harness.app.clone(),
            "/api/v1/auth/logout",
            serde_json::json!({ "refresh_token": refresh }),
            access,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "revoking a dead token never errors");
    }
}
