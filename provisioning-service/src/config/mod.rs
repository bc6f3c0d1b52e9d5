use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_or, parse_env};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub backend_mode: BackendMode,
    pub appwrite: AppwriteConfig,
    pub provisioning: ProvisioningSettings,
    pub session: SessionConfig,
    pub app_url: String,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

/// Which backend the service talks to.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Appwrite,
    /// In-process backend for local runs. Never allowed in prod.
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppwriteConfig {
    /// Base URL including the API version, e.g. `https://cloud.appwrite.io/v1`.
    pub endpoint: String,
    pub project_id: String,
    pub api_key: Secret<String>,
    pub database_id: String,
    pub profiles_collection_id: String,
    pub request_timeout_secs: u64,
    pub read_retries: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProvisioningSettings {
    /// Undo committed steps when a later step fails.
    pub compensate_on_failure: bool,
    /// Give the acting admin read/update on profiles they create.
    pub grant_admin_access: bool,
    /// Team that self-service signups join.
    pub viewer_team_id: Option<String>,
    pub default_role: String,
    pub default_role_display_name: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_days: i64,
    pub secure: bool,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Profile roles allowed on `/admin/*`.
    pub admin_roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub signup_attempts: u32,
    pub signup_window_seconds: u64,
    pub password_recovery_attempts: u32,
    pub password_recovery_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Key limits on `x-forwarded-for`. Only set behind a proxy that overwrites it.
    pub trust_forwarded_for: bool,
}

impl ProvisioningConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let backend_mode: BackendMode = get_env_or("BACKEND_MODE", "appwrite")
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        // Appwrite settings are only mandatory when we actually talk to Appwrite.
        let appwrite_required = backend_mode == BackendMode::Appwrite;
        let appwrite_env = |key: &str, local_default: &str| -> Result<String, AppError> {
            if appwrite_required {
                get_env(key, None, is_prod)
            } else {
                Ok(get_env_or(key, local_default))
            }
        };

        let config = ProvisioningConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("provisioning-service"), is_prod)?,
            service_version: get_env_or("SERVICE_VERSION", env!("CARGO_PKG_VERSION")),
            log_level: get_env_or("LOG_LEVEL", "info"),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            backend_mode,
            appwrite: AppwriteConfig {
                endpoint: appwrite_env("APPWRITE_ENDPOINT", "http://localhost/v1")?
                    .trim_end_matches('/')
                    .to_string(),
                project_id: appwrite_env("APPWRITE_PROJECT_ID", "local")?,
                api_key: Secret::new(appwrite_env("APPWRITE_API_KEY", "")?),
                database_id: appwrite_env("APPWRITE_DATABASE_ID", "main")?,
                profiles_collection_id: appwrite_env("APPWRITE_PROFILES_COLLECTION_ID", "profiles")?,
                request_timeout_secs: parse_env(
                    "APPWRITE_TIMEOUT_SECONDS",
                    get_env_or("APPWRITE_TIMEOUT_SECONDS", "10"),
                )?,
                read_retries: parse_env(
                    "APPWRITE_READ_RETRIES",
                    get_env_or("APPWRITE_READ_RETRIES", "2"),
                )?,
            },
            provisioning: ProvisioningSettings {
                compensate_on_failure: parse_env(
                    "PROVISIONING_COMPENSATE_ON_FAILURE",
                    get_env_or("PROVISIONING_COMPENSATE_ON_FAILURE", "false"),
                )?,
                grant_admin_access: parse_env(
                    "PROVISIONING_GRANT_ADMIN_ACCESS",
                    get_env_or("PROVISIONING_GRANT_ADMIN_ACCESS", "false"),
                )?,
                viewer_team_id: env::var("APPWRITE_VIEWER_TEAM_ID")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                default_role: get_env_or("SIGNUP_DEFAULT_ROLE", "viewer"),
                default_role_display_name: get_env_or("SIGNUP_DEFAULT_ROLE_DISPLAY_NAME", "Viewer"),
            },
            session: SessionConfig {
                cookie_name: get_env_or("SESSION_COOKIE_NAME", "appwrite-session"),
                max_age_days: parse_env(
                    "SESSION_MAX_AGE_DAYS",
                    get_env_or("SESSION_MAX_AGE_DAYS", "30"),
                )?,
                secure: is_prod,
            },
            app_url: get_env("APP_URL", Some("http://localhost:3000"), is_prod)?
                .trim_end_matches('/')
                .to_string(),
            security: SecurityConfig {
                allowed_origins: split_list(&get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?),
                admin_roles: split_list(&get_env_or("ADMIN_ROLES", "admin")),
            },
            swagger: SwaggerConfig {
                enabled: get_env_or("ENABLE_SWAGGER", if is_prod { "disabled" } else { "public" })
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env_or("RATE_LIMIT_LOGIN_ATTEMPTS", "5")
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get_env_or("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900")
                    .parse()
                    .unwrap_or(900),
                signup_attempts: get_env_or("RATE_LIMIT_SIGNUP_ATTEMPTS", "3")
                    .parse()
                    .unwrap_or(3),
                signup_window_seconds: get_env_or("RATE_LIMIT_SIGNUP_WINDOW_SECONDS", "3600")
                    .parse()
                    .unwrap_or(3600),
                password_recovery_attempts: get_env_or("RATE_LIMIT_PASSWORD_RECOVERY_ATTEMPTS", "3")
                    .parse()
                    .unwrap_or(3),
                password_recovery_window_seconds: get_env_or(
                    "RATE_LIMIT_PASSWORD_RECOVERY_WINDOW_SECONDS",
                    "3600",
                )
                .parse()
                .unwrap_or(3600),
                global_ip_limit: get_env_or("RATE_LIMIT_GLOBAL_IP_LIMIT", "100")
                    .parse()
                    .unwrap_or(100),
                global_ip_window_seconds: get_env_or("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", "60")
                    .parse()
                    .unwrap_or(60),
                trust_forwarded_for: get_env_or("TRUST_X_FORWARDED_FOR", "false")
                    .parse()
                    .unwrap_or(false),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session.max_age_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_MAX_AGE_DAYS must be positive"
            )));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_COOKIE_NAME must not be empty"
            )));
        }

        if self.is_prod() {
            if self.backend_mode == BackendMode::Memory {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "BACKEND_MODE=memory is not allowed in production"
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger UI is publicly accessible in production");
            }
        }

        if self.provisioning.viewer_team_id.is_none() {
            tracing::warn!("APPWRITE_VIEWER_TEAM_ID is not set, self-service signup is disabled");
        }

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "appwrite" => Ok(BackendMode::Appwrite),
            "memory" => Ok(BackendMode::Memory),
            _ => Err(format!("Invalid backend mode: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
