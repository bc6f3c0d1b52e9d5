use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::models::is_valid_id;

/// Input to the provisioning orchestrator.
///
/// Missing JSON fields deserialize to empty values so they are reported by
/// validation rather than rejected by the JSON extractor.
#[derive(Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    #[schema(example = "a@x.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    #[schema(example = "longenough1", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, message = "Full name is required"))]
    #[schema(example = "A B")]
    pub full_name: String,

    #[validate(length(min = 1, message = "Role is required"))]
    #[schema(example = "viewer")]
    pub role: String,

    #[validate(length(min = 1, message = "Role display name is required"))]
    #[schema(example = "Viewer")]
    pub role_display_name: String,

    #[validate(
        length(min = 1, message = "Team is required"),
        custom(function = "validate_resource_id")
    )]
    #[schema(example = "viewer-team")]
    pub team_id: String,

    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub is_active: Option<bool>,
    /// Roles inside the team. Empty by default.
    pub sub_roles: Vec<String>,
}

impl fmt::Debug for ProvisionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("team_id", &self.team_id)
            .finish_non_exhaustive()
    }
}

/// Ids end up in backend URL paths. Emptiness is reported by `length`.
pub(crate) fn validate_resource_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || is_valid_id(id) {
        return Ok(());
    }
    let mut err = ValidationError::new("resource_id");
    err.message = Some("Team id may only contain letters, digits, '.', '_' and '-'".into());
    Err(err)
}

/// Failure classification shared by every orchestrator outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    ValidationError,
    ConflictError,
    NotFoundError,
    UnauthorizedError,
    UpstreamError,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ConflictError => StatusCode::CONFLICT,
            ErrorKind::NotFoundError => StatusCode::NOT_FOUND,
            ErrorKind::UnauthorizedError => StatusCode::UNAUTHORIZED,
            ErrorKind::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ConflictError => "conflict_error",
            ErrorKind::NotFoundError => "not_found_error",
            ErrorKind::UnauthorizedError => "unauthorized_error",
            ErrorKind::UpstreamError => "upstream_error",
        }
    }
}

/// A remote side effect of provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningStep {
    Identity,
    Profile,
    Membership,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "u1")]
    pub identity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[schema(example = "User A B created successfully.")]
    pub message: String,
    /// Upstream diagnostic text, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_fields: Vec<String>,
    /// Steps that took effect remotely, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub committed_steps: Vec<ProvisioningStep>,
    /// Steps undone by compensation after a failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compensated_steps: Vec<ProvisioningStep>,
}

impl ProvisionOutcome {
    pub fn succeeded(identity_id: String, message: String) -> Self {
        Self {
            success: true,
            identity_id: Some(identity_id),
            error_kind: None,
            message,
            details: None,
            invalid_fields: Vec::new(),
            committed_steps: vec![
                ProvisioningStep::Identity,
                ProvisioningStep::Profile,
                ProvisioningStep::Membership,
            ],
            compensated_steps: Vec::new(),
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            identity_id: None,
            error_kind: Some(kind),
            message: message.into(),
            details,
            invalid_fields: Vec::new(),
            committed_steps: Vec::new(),
            compensated_steps: Vec::new(),
        }
    }

    pub fn result_label(&self) -> &'static str {
        self.error_kind.map(|k| k.as_str()).unwrap_or("success")
    }
}

impl IntoResponse for ProvisionOutcome {
    fn into_response(self) -> Response {
        let status = match self.error_kind {
            Some(kind) => kind.status_code(),
            None => StatusCode::CREATED,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeprovisionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Benign anomalies, such as a resource that was already gone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DeprovisionOutcome {
    pub fn succeeded(message: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            error_kind: None,
            message: message.into(),
            details: None,
            warnings,
        }
    }

    pub fn failed(
        kind: ErrorKind,
        message: impl Into<String>,
        details: Option<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            error_kind: Some(kind),
            message: message.into(),
            details,
            warnings,
        }
    }

    pub fn result_label(&self) -> &'static str {
        match (self.error_kind, self.warnings.is_empty()) {
            (Some(kind), _) => kind.as_str(),
            (None, true) => "success",
            (None, false) => "success_with_warnings",
        }
    }
}

impl IntoResponse for DeprovisionOutcome {
    fn into_response(self) -> Response {
        let status = match self.error_kind {
            Some(kind) => kind.status_code(),
            None => StatusCode::OK,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DeprovisionParams {
    /// Delete the identity even if profile deletion failed.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListUsersParams {
    pub role: Option<String>,
    pub team_id: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub total: usize,
    pub users: Vec<crate::models::ProfileRecord>,
}
