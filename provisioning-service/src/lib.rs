pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Json, Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{BackendMode, ProvisioningConfig, SwaggerMode};
use crate::services::{
    AccountService, AppwriteClient, Backend, InMemoryBackend, ProfileService,
    ProvisioningService, SessionResolver,
};
use service_core::error::AppError;
use std::sync::Arc;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::metrics::metrics,
        handlers::auth::signup,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::request_password_recovery,
        handlers::user::get_me,
        handlers::user::get_my_profile,
        handlers::user::update_my_profile,
        handlers::admin::create_user,
        handlers::admin::list_users,
        handlers::admin::update_user_profile,
        handlers::admin::delete_user,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::SignupRequest,
            dtos::auth::LoginRequest,
            dtos::auth::PasswordRecoveryRequest,
            dtos::auth::AuthResponse,
            dtos::auth::MessageResponse,
            dtos::profile::UpdateProfileRequest,
            dtos::profile::AdminUpdateProfileRequest,
            dtos::users::ProvisionRequest,
            dtos::users::ProvisionOutcome,
            dtos::users::DeprovisionOutcome,
            dtos::users::ErrorKind,
            dtos::users::ProvisioningStep,
            dtos::users::UserListResponse,
            models::Identity,
            models::ProfileData,
            models::ProfileRecord,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Signup, login and session management"),
        (name = "User", description = "Current user and own profile"),
        (name = "Admin", description = "User provisioning and administration"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("appwrite-session"))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: ProvisioningConfig,
    pub provisioning: ProvisioningService,
    pub accounts: AccountService,
    pub profiles: ProfileService,
    pub sessions: SessionResolver,
    pub login_rate_limiter: IpRateLimiter,
    pub signup_rate_limiter: IpRateLimiter,
    pub password_recovery_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire services and rate limiters over a backend.
    pub fn new(config: ProvisioningConfig, backend: Backend) -> Self {
        let provisioning = ProvisioningService::new(&backend, config.provisioning.clone());
        let sessions = SessionResolver::new(backend.identity.clone(), config.session.clone());
        let accounts = AccountService::new(
            backend.identity.clone(),
            provisioning.clone(),
            sessions.clone(),
            config.provisioning.clone(),
            config.app_url.clone(),
        );
        let profiles = ProfileService::new(&backend);

        let limits = &config.rate_limit;
        let limiter = |attempts, window_seconds| {
            create_ip_rate_limiter(attempts, window_seconds)
                .trust_forwarded_for(limits.trust_forwarded_for)
        };
        let login_rate_limiter = limiter(limits.login_attempts, limits.login_window_seconds);
        let signup_rate_limiter = limiter(limits.signup_attempts, limits.signup_window_seconds);
        let password_recovery_rate_limiter = limiter(
            limits.password_recovery_attempts,
            limits.password_recovery_window_seconds,
        );
        let ip_rate_limiter = limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Self {
            config,
            provisioning,
            accounts,
            profiles,
            sessions,
            login_rate_limiter,
            signup_rate_limiter,
            password_recovery_rate_limiter,
            ip_rate_limiter,
        }
    }
}

/// Build the backend selected by `BACKEND_MODE`.
pub fn connect_backend(config: &ProvisioningConfig) -> Result<Backend, AppError> {
    match config.backend_mode {
        BackendMode::Appwrite => {
            let client = AppwriteClient::new(config.appwrite.clone())?;
            Ok(Backend::from_shared(Arc::new(client)))
        }
        BackendMode::Memory => {
            let memory = InMemoryBackend::new();
            if let Some(team_id) = &config.provisioning.viewer_team_id {
                memory.add_team(team_id);
            }
            Ok(Backend::from_shared(Arc::new(memory)))
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route(
            "/admin/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route("/admin/users/:id", delete(handlers::admin::delete_user))
        .route(
            "/admin/users/:id/profile",
            patch(handlers::admin::update_user_profile),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let session_routes = Router::new()
        .route("/users/me", get(handlers::user::get_me))
        .route(
            "/users/me/profile",
            get(handlers::user::get_my_profile).patch(handlers::user::update_my_profile),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let signup_route = Router::new()
        .route("/auth/signup", post(handlers::auth::signup))
        .layer(from_fn_with_state(
            state.signup_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let recovery_route = Router::new()
        .route(
            "/auth/password-recovery",
            post(handlers::auth::request_password_recovery),
        )
        .layer(from_fn_with_state(
            state.password_recovery_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    if state.config.swagger.enabled == SwaggerMode::Public {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route("/auth/logout", post(handlers::auth::logout))
        .merge(login_route)
        .merge(signup_route)
        .merge(recovery_route)
        .merge(session_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    identity_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins));

    Ok(app)
}

/// Credentialed CORS for the configured origins. Unparseable or wildcard
/// origins are dropped, credentials cannot be combined with `*`.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| {
            if o == "*" {
                tracing::error!("Wildcard CORS origin ignored, cookies require explicit origins");
                return None;
            }
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}. Ignoring.", o, e))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "backend": format!("{:?}", state.config.backend_mode).to_lowercase(),
    }))
}
