//! Appwrite REST client against a mock HTTP server.

use provisioning_service::{
    config::AppwriteConfig,
    models::{NewAccount, Permission, ProfileData, Query},
    services::{AppwriteClient, BackendError, IdentityService, ProfileStore, TeamClient},
};
use secrecy::Secret;
use serde_json::json;
use service_core::http::RetryConfig;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn config(server: &MockServer) -> AppwriteConfig {
    AppwriteConfig {
        endpoint: format!("{}/v1", server.uri()),
        project_id: "proj".to_string(),
        api_key: Secret::new("secret-key".to_string()),
        database_id: "main".to_string(),
        profiles_collection_id: "profiles".to_string(),
        request_timeout_secs: 5,
        read_retries: 0,
    }
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 1.0,
        add_jitter: false,
    }
}

fn user_json(id: &str, email: &str) -> serde_json::Value {
    json!({
        "$id": id,
        "email": email,
        "name": "A B",
        "emailVerification": false,
        "status": true
    })
}

fn profile_json(id: &str) -> serde_json::Value {
    json!({
        "$id": id,
        "$collectionId": "profiles",
        "$permissions": [],
        "userId": id,
        "fullName": "A B",
        "email": "a@x.com",
        "phone": null,
        "role": "viewer",
        "roleDisplayName": "Viewer",
        "teamId": "viewer-team",
        "isActive": true,
        "address": null,
        "city": null,
        "country": null,
        "postalCode": null
    })
}

fn sample_profile() -> ProfileData {
    ProfileData {
        user_id: "u1".into(),
        full_name: "A B".into(),
        email: "a@x.com".into(),
        phone: String::new(),
        role: "viewer".into(),
        role_display_name: "Viewer".into(),
        team_id: "viewer-team".into(),
        is_active: true,
        address: String::new(),
        city: String::new(),
        country: String::new(),
        postal_code: String::new(),
        profile_image_url: None,
        created_by: None,
        updated_by: None,
    }
}

#[tokio::test]
async fn create_account_sends_admin_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users"))
        .and(header("X-Appwrite-Project", "proj"))
        .and(header("X-Appwrite-Key", "secret-key"))
        .and(body_partial_json(json!({ "email": "a@x.com", "name": "A B" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(user_json("u1", "a@x.com")))
        .expect(1)
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();
    let identity = client
        .create_account(&NewAccount {
            user_id: None,
            email: "a@x.com".into(),
            password: "longenough1".into(),
            name: "A B".into(),
        })
        .await
        .unwrap();

    assert_eq!(identity.id, "u1");
    assert!(!identity.email_verified);
}

#[tokio::test]
async fn conflict_status_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "A user with the same id, email, or phone already exists in this project.",
            "code": 409,
            "type": "user_already_exists"
        })))
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();
    let err = client
        .create_account(&NewAccount {
            user_id: Some("u1".into()),
            email: "a@x.com".into(),
            password: "longenough1".into(),
            name: "A B".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Conflict(ref m) if m.contains("already exists")));
}

#[tokio::test]
async fn session_lookup_uses_session_header_and_maps_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .and(header("X-Appwrite-Session", "good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1", "a@x.com")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .and(header("X-Appwrite-Session", "stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "User (role: guests) missing scope (account)",
            "code": 401,
            "type": "general_unauthorized_scope"
        })))
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();

    let identity = client.get_current_user("good").await.unwrap();
    assert_eq!(identity.email, "a@x.com");

    let err = client.get_current_user("stale").await.unwrap_err();
    assert!(matches!(err, BackendError::Unauthorized(_)));
}

#[tokio::test]
async fn reads_are_retried_on_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/databases/main/collections/profiles/documents/u1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/databases/main/collections/profiles/documents/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json("u1")))
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server))
        .unwrap()
        .with_retry(fast_retry(2));
    let record = client.get_document("u1").await.unwrap();

    assert_eq!(record.id, "u1");
    assert_eq!(record.data.phone, "");
    assert!(record.data.is_active);
}

#[tokio::test]
async fn writes_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/main/collections/profiles/documents"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server))
        .unwrap()
        .with_retry(fast_retry(3));
    let err = client
        .create_document("u1", &sample_profile(), &Permission::owner("u1"))
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Unavailable(_)));
}

#[tokio::test]
async fn create_document_sends_id_and_permissions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/main/collections/profiles/documents"))
        .and(body_partial_json(json!({
            "documentId": "u1",
            "data": { "userId": "u1", "teamId": "viewer-team", "isActive": true },
            "permissions": ["read(\"user:u1\")", "update(\"user:u1\")"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(profile_json("u1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();
    let record = client
        .create_document("u1", &sample_profile(), &Permission::owner("u1"))
        .await
        .unwrap();

    assert_eq!(record.data.user_id, "u1");
}

#[tokio::test]
async fn list_documents_passes_queries() {
    let server = MockServer::start().await;
    let query = Query::equal("role", "viewer").to_wire();
    Mock::given(method("GET"))
        .and(path("/v1/databases/main/collections/profiles/documents"))
        .and(query_param("queries[]", query.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "documents": [profile_json("u1")]
        })))
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();
    let records = client
        .list_documents(&[Query::equal("role", "viewer")])
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn missing_team_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/teams/nope/memberships"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Team with the requested ID could not be found.",
            "code": 404,
            "type": "team_not_found"
        })))
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();
    let err = client
        .create_membership("nope", &[], "a@x.com")
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::NotFound(_)));
}

#[tokio::test]
async fn undecodable_success_body_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();
    let err = client.get_account("u1").await.unwrap_err();

    assert!(matches!(err, BackendError::Upstream { code: 502, .. }));
}

#[tokio::test]
async fn path_like_ids_never_reach_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/teams/T"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let client = AppwriteClient::new(config(&server)).unwrap();

    let err = client.delete_account("x/../../teams/T").await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidArgument(_)));

    let err = client.delete_document("..").await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidArgument(_)));

    let err = client
        .create_membership("../users", &[], "a@x.com")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::InvalidArgument(_)));
}
