//! Self-service account flows: signup, login, logout and password recovery.

use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::backend::IdentityService;
use super::error::{BackendError, ServiceError};
use super::provisioning::ProvisioningService;
use super::session::SessionResolver;
use crate::config::ProvisioningSettings;
use crate::dtos::auth::{LoginRequest, SignupRequest};
use crate::dtos::users::{ErrorKind, ProvisionOutcome, ProvisionRequest};
use crate::models::Session;

#[derive(Clone)]
pub struct AccountService {
    identity: Arc<dyn IdentityService>,
    provisioning: ProvisioningService,
    sessions: SessionResolver,
    settings: ProvisioningSettings,
    app_url: String,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        provisioning: ProvisioningService,
        sessions: SessionResolver,
        settings: ProvisioningSettings,
        app_url: String,
    ) -> Self {
        Self {
            identity,
            provisioning,
            sessions,
            settings,
            app_url,
        }
    }

    /// Provision a viewer account and sign it in.
    #[instrument(skip(self, jar, request), fields(email = %request.email))]
    pub async fn signup(
        &self,
        jar: CookieJar,
        request: SignupRequest,
    ) -> Result<(CookieJar, String), ServiceError> {
        let team_id = self.settings.viewer_team_id.clone().ok_or_else(|| {
            ServiceError::Configuration(
                "Signup is not available. Please contact support.".to_string(),
            )
        })?;

        let provision = ProvisionRequest {
            email: request.email.clone(),
            password: request.password.clone(),
            full_name: request.name,
            role: self.settings.default_role.clone(),
            role_display_name: self.settings.default_role_display_name.clone(),
            team_id,
            ..Default::default()
        };

        let outcome = self.provisioning.provision(provision, None).await;
        let identity_id = match outcome.identity_id.clone() {
            Some(id) if outcome.success => id,
            _ => return Err(outcome_error(outcome)),
        };

        let session = self.open_session(&request.email, &request.password).await?;
        info!(identity_id = %identity_id, "Signup complete");
        Ok((self.sessions.issue(jar, &session), identity_id))
    }

    #[instrument(skip(self, jar, request), fields(email = %request.email))]
    pub async fn login(
        &self,
        jar: CookieJar,
        request: LoginRequest,
    ) -> Result<(CookieJar, String), ServiceError> {
        let session = self.open_session(&request.email, &request.password).await?;
        info!(identity_id = %session.user_id, "Login successful");
        let user_id = session.user_id.clone();
        Ok((self.sessions.issue(jar, &session), user_id))
    }

    /// End the session upstream if possible. The cookie is always removed.
    #[instrument(skip_all)]
    pub async fn logout(&self, jar: CookieJar) -> CookieJar {
        if let Some(token) = self.sessions.token(&jar) {
            if let Err(err) = self.identity.delete_session(&token).await {
                warn!(error = %err, "Failed to delete upstream session");
            }
        }
        self.sessions.clear(jar)
    }

    /// Ask the identity service to send a recovery email.
    ///
    /// Unknown emails are reported as success so the endpoint does not reveal
    /// which addresses have accounts.
    #[instrument(skip(self))]
    pub async fn request_password_recovery(&self, email: &str) -> Result<(), ServiceError> {
        let redirect_url = format!("{}/auth/reset-password", self.app_url);
        match self.identity.create_recovery(email.trim(), &redirect_url).await {
            Ok(()) => {
                info!("Password recovery email requested");
                Ok(())
            }
            Err(BackendError::NotFound(_)) => {
                info!("Password recovery requested for unknown email");
                Ok(())
            }
            Err(err) => Err(ServiceError::upstream(
                "Failed to send password recovery email.",
                &err,
            )),
        }
    }

    async fn open_session(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        match self.identity.create_session(email.trim(), password).await {
            Ok(session) => Ok(session),
            Err(BackendError::Unauthorized(_)) | Err(BackendError::InvalidArgument(_)) => {
                Err(ServiceError::InvalidCredentials)
            }
            Err(err) => Err(ServiceError::upstream("Login failed. Please try again.", &err)),
        }
    }
}

/// Turn a failed provisioning outcome into the HTTP-facing error.
pub fn outcome_error(outcome: ProvisionOutcome) -> ServiceError {
    match outcome.error_kind {
        Some(ErrorKind::ValidationError) => ServiceError::Validation(outcome.message),
        Some(ErrorKind::ConflictError) => ServiceError::Conflict(outcome.message),
        Some(ErrorKind::NotFoundError) => ServiceError::NotFound(outcome.message),
        Some(ErrorKind::UnauthorizedError) => ServiceError::Unauthorized,
        Some(ErrorKind::UpstreamError) | None => ServiceError::Upstream {
            message: outcome.message,
            details: outcome.details,
        },
    }
}
