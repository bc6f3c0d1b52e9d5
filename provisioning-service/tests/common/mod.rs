//! Test helpers for provisioning-service integration tests.
//!
//! Builds the full router over an in-memory backend and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use provisioning_service::{
    build_router,
    config::{
        AppwriteConfig, BackendMode, Environment, ProvisioningConfig, ProvisioningSettings,
        RateLimitConfig, SecurityConfig, SessionConfig, SwaggerConfig, SwaggerMode,
    },
    dtos::users::ProvisionRequest,
    models::{Identity, NewAccount, ProfileData, Permission},
    services::{Backend, IdentityService, InMemoryBackend, ProfileStore},
    AppState,
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const VIEWER_TEAM: &str = "viewer-team";
pub const SALES_TEAM: &str = "sales-team";
pub const COOKIE_NAME: &str = "appwrite-session";
pub const PASSWORD: &str = "longenough1";

pub fn test_config() -> ProvisioningConfig {
    ProvisioningConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "provisioning-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        backend_mode: BackendMode::Memory,
        appwrite: AppwriteConfig {
            endpoint: "http://localhost/v1".to_string(),
            project_id: "test-project".to_string(),
            api_key: Secret::new("test-key".to_string()),
            database_id: "main".to_string(),
            profiles_collection_id: "profiles".to_string(),
            request_timeout_secs: 5,
            read_retries: 0,
        },
        provisioning: ProvisioningSettings {
            compensate_on_failure: false,
            grant_admin_access: false,
            viewer_team_id: Some(VIEWER_TEAM.to_string()),
            default_role: "viewer".to_string(),
            default_role_display_name: "Viewer".to_string(),
        },
        session: SessionConfig {
            cookie_name: COOKIE_NAME.to_string(),
            max_age_days: 30,
            secure: false,
        },
        app_url: "http://localhost:3000".to_string(),
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_roles: vec!["admin".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            signup_attempts: 100,
            signup_window_seconds: 60,
            password_recovery_attempts: 100,
            password_recovery_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
            trust_forwarded_for: false,
        },
    }
}

pub fn provision_request(email: &str) -> ProvisionRequest {
    ProvisionRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        full_name: "A B".to_string(),
        role: "viewer".to_string(),
        role_display_name: "Viewer".to_string(),
        team_id: VIEWER_TEAM.to_string(),
        ..Default::default()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `Set-Cookie` header for the session cookie, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
            .map(|v| v.to_string())
    }
}

pub struct TestApp {
    pub router: Router,
    pub backend: Arc<InMemoryBackend>,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(customize: impl FnOnce(&mut ProvisioningConfig)) -> Self {
        let mut config = test_config();
        customize(&mut config);

        let backend = Arc::new(
            InMemoryBackend::new()
                .with_team(VIEWER_TEAM)
                .with_team(SALES_TEAM),
        );
        let state = AppState::new(config, Backend::from_shared(backend.clone()));
        let router = build_router(state.clone())
            .await
            .expect("router should build");

        Self {
            router,
            backend,
            state,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Create an identity directly in the backend and return a `Cookie` header value.
    pub async fn seed_user(&self, email: &str, role: &str) -> (Identity, String) {
        let identity = self
            .backend
            .create_account(&NewAccount {
                user_id: None,
                email: email.to_string(),
                password: PASSWORD.to_string(),
                name: "Seeded User".to_string(),
            })
            .await
            .unwrap();

        let data = ProfileData {
            user_id: identity.id.clone(),
            full_name: "Seeded User".to_string(),
            email: email.to_string(),
            phone: String::new(),
            role: role.to_string(),
            role_display_name: role.to_string(),
            team_id: VIEWER_TEAM.to_string(),
            is_active: true,
            address: String::new(),
            city: String::new(),
            country: String::new(),
            postal_code: String::new(),
            profile_image_url: None,
            created_by: None,
            updated_by: None,
        };
        self.backend
            .create_document(&identity.id, &data, &Permission::owner(&identity.id))
            .await
            .unwrap();

        let session = self.backend.create_session(email, PASSWORD).await.unwrap();
        (identity, format!("{}={}", COOKIE_NAME, session.secret))
    }

    pub async fn seed_admin(&self) -> (Identity, String) {
        self.seed_user("admin@x.com", "admin").await
    }
}
