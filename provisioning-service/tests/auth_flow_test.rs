//! Signup, login, logout and password recovery over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, COOKIE_NAME, PASSWORD, VIEWER_TEAM};
use serde_json::json;

fn cookie_header(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn signup_provisions_viewer_and_sets_session_cookie() {
    let app = TestApp::spawn().await;

    let response = app
        .request(
            Method::POST,
            "/auth/signup",
            Some(json!({ "email": "new@x.com", "password": PASSWORD, "name": "New User" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["identityId"], "u1");
    assert_eq!(response.body["redirectTo"], "/dashboard");

    let set_cookie = response.session_cookie().expect("session cookie set");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let profile = app.backend.document("u1").unwrap();
    assert_eq!(profile.data.role, "viewer");
    assert_eq!(profile.data.team_id, VIEWER_TEAM);
    assert_eq!(app.backend.memberships(VIEWER_TEAM).len(), 1);

    let me = app
        .request(Method::GET, "/users/me", None, Some(&cookie_header(&set_cookie)))
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "new@x.com");
}

#[tokio::test]
async fn signup_with_taken_email_is_conflict() {
    let app = TestApp::spawn().await;
    app.seed_user("taken@x.com", "viewer").await;

    let response = app
        .request(
            Method::POST,
            "/auth/signup",
            Some(json!({ "email": "taken@x.com", "password": PASSWORD, "name": "Again" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "User with this email already exists.");
    assert!(response.session_cookie().is_none());
}

#[tokio::test]
async fn signup_rejects_short_password() {
    let app = TestApp::spawn().await;

    let response = app
        .request(
            Method::POST,
            "/auth/signup",
            Some(json!({ "email": "new@x.com", "password": "short", "name": "New" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.backend.total_calls(), 0);
}

#[tokio::test]
async fn signup_without_viewer_team_is_unavailable() {
    let app = TestApp::spawn_with(|config| {
        config.provisioning.viewer_team_id = None;
    })
    .await;

    let response = app
        .request(
            Method::POST,
            "/auth/signup",
            Some(json!({ "email": "new@x.com", "password": PASSWORD, "name": "New" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.backend.account("u1").is_none());
}

#[tokio::test]
async fn login_sets_cookie_and_bad_password_is_rejected() {
    let app = TestApp::spawn().await;
    let (identity, _) = app.seed_user("user@x.com", "viewer").await;

    let ok = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "user@x.com", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["identityId"], identity.id.as_str());
    assert!(ok.session_cookie().is_some());

    let bad = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "user@x.com", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.body["error"], "Invalid email or password.");
    assert!(bad.session_cookie().is_none());
}

#[tokio::test]
async fn logout_ends_session_and_clears_cookie() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.seed_user("user@x.com", "viewer").await;

    let response = app
        .request(Method::POST, "/auth/logout", None, Some(&cookie))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Logged out successfully");
    let removal = response.session_cookie().expect("removal cookie");
    assert!(removal.starts_with(&format!("{}=;", COOKIE_NAME)));

    let me = app
        .request(Method::GET, "/users/me", None, Some(&cookie))
        .await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_without_session_still_succeeds() {
    let app = TestApp::spawn().await;

    let response = app.request(Method::POST, "/auth/logout", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn password_recovery_does_not_reveal_unknown_emails() {
    let app = TestApp::spawn().await;
    app.seed_user("user@x.com", "viewer").await;

    let known = app
        .request(
            Method::POST,
            "/auth/password-recovery",
            Some(json!({ "email": "user@x.com" })),
            None,
        )
        .await;
    let unknown = app
        .request(
            Method::POST,
            "/auth/password-recovery",
            Some(json!({ "email": "nobody@x.com" })),
            None,
        )
        .await;

    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(known.body, unknown.body);
    assert_eq!(
        app.backend.recoveries(),
        vec![(
            "user@x.com".to_string(),
            "http://localhost:3000/auth/reset-password".to_string()
        )]
    );
}
