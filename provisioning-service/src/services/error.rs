use service_core::error::AppError;
use service_core::http::Retryable;
use thiserror::Error;

/// Classified failure from a backend call.
///
/// Every variant carries the backend's own message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error ({code}): {message}")]
    Upstream { code: u16, message: String },
}

impl BackendError {
    /// Classify an HTTP status returned by the backend.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            409 => BackendError::Conflict(message),
            404 => BackendError::NotFound(message),
            401 => BackendError::Unauthorized(message),
            400 => BackendError::InvalidArgument(message),
            500..=599 => BackendError::Unavailable(message),
            code => BackendError::Upstream { code, message },
        }
    }

    /// The backend's message, without our classification prefix.
    pub fn message(&self) -> &str {
        match self {
            BackendError::Conflict(m)
            | BackendError::NotFound(m)
            | BackendError::Unauthorized(m)
            | BackendError::InvalidArgument(m)
            | BackendError::Unavailable(m) => m,
            BackendError::Upstream { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Unavailable(err.to_string())
    }
}

impl Retryable for BackendError {
    fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

/// Failures of the self-service and admin flows outside the orchestrators.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized. Please log in.")]
    Unauthorized,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },

    #[error("{0}")]
    Configuration(String),
}

impl ServiceError {
    /// Wrap a backend failure with a human-readable message.
    pub fn upstream(message: impl Into<String>, err: &BackendError) -> Self {
        ServiceError::Upstream {
            message: message.into(),
            details: Some(err.message().to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(m) => AppError::BadRequest(anyhow::anyhow!(m)),
            ServiceError::Conflict(m) => AppError::Conflict(anyhow::anyhow!(m)),
            ServiceError::NotFound(m) => AppError::NotFound(anyhow::anyhow!(m)),
            e @ ServiceError::Unauthorized | e @ ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!(e.to_string()))
            }
            e @ ServiceError::Forbidden => AppError::Forbidden(anyhow::anyhow!(e.to_string())),
            ServiceError::Upstream { message, details } => AppError::BadGateway(message, details),
            ServiceError::Configuration(m) => AppError::ConfigError(anyhow::anyhow!(m)),
        }
    }
}
