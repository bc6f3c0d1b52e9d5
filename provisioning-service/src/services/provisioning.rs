//! Provisioning and deprovisioning orchestrators.
//!
//! Provisioning runs three remote steps in order: identity, profile, team
//! membership. The steps are not atomic. A failure after the identity exists
//! is reported with the steps that were committed, and is only undone when
//! `compensate_on_failure` is enabled.
//!
//! Both orchestrators return structured outcomes and never `Err`.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::{Validate, ValidationErrors};

use super::backend::{Backend, IdentityService, ProfileStore, TeamClient};
use super::error::BackendError;
use super::metrics;
use crate::config::ProvisioningSettings;
use crate::dtos::users::{
    DeprovisionOutcome, ErrorKind, ProvisionOutcome, ProvisionRequest, ProvisioningStep,
};
use crate::models::{is_valid_id, NewAccount, Permission, ProfileData, Role};

#[derive(Clone)]
pub struct ProvisioningService {
    identity: Arc<dyn IdentityService>,
    profiles: Arc<dyn ProfileStore>,
    teams: Arc<dyn TeamClient>,
    settings: ProvisioningSettings,
}

impl ProvisioningService {
    pub fn new(backend: &Backend, settings: ProvisioningSettings) -> Self {
        Self {
            identity: backend.identity.clone(),
            profiles: backend.profiles.clone(),
            teams: backend.teams.clone(),
            settings,
        }
    }

    /// Create identity, profile and team membership for a new user.
    ///
    /// `actor` is the identity id of the admin doing the provisioning, if any.
    #[instrument(skip(self, request), fields(email = %request.email, team_id = %request.team_id))]
    pub async fn provision(&self, request: ProvisionRequest, actor: Option<&str>) -> ProvisionOutcome {
        let outcome = self.run_provision(&request, actor).await;
        metrics::record_outcome("provision", outcome.result_label());
        outcome
    }

    async fn run_provision(&self, request: &ProvisionRequest, actor: Option<&str>) -> ProvisionOutcome {
        if let Err(errors) = request.validate() {
            let fields = invalid_fields(&errors);
            warn!(fields = ?fields, "Provisioning request failed validation");
            let mut outcome =
                ProvisionOutcome::failed(ErrorKind::ValidationError, validation_message(&errors, &fields), None);
            outcome.invalid_fields = fields;
            return outcome;
        }

        let account = NewAccount {
            user_id: None,
            email: request.email.trim().to_string(),
            password: request.password.clone(),
            name: request.full_name.trim().to_string(),
        };

        let identity = match self.identity.create_account(&account).await {
            Ok(identity) => identity,
            Err(BackendError::Conflict(msg)) => {
                info!("Identity already exists for this email");
                return ProvisionOutcome::failed(
                    ErrorKind::ConflictError,
                    "User with this email already exists.",
                    Some(msg),
                );
            }
            Err(err) => {
                error!(error = %err, "Failed to create identity");
                return ProvisionOutcome::failed(
                    ErrorKind::UpstreamError,
                    format!("Failed to create user account: {}", err.message()),
                    Some(err.to_string()),
                );
            }
        };
        let identity_id = identity.id.clone();
        info!(identity_id = %identity_id, step = "identity", "Identity created");

        let mut committed = vec![ProvisioningStep::Identity];

        let data = profile_data(&identity_id, request, actor);
        let permissions = self.profile_permissions(&identity_id, actor);
        if let Err(err) = self
            .profiles
            .create_document(&identity_id, &data, &permissions)
            .await
        {
            error!(identity_id = %identity_id, error = %err, "Failed to create profile");
            return self
                .fail_after(
                    committed,
                    &identity_id,
                    format!(
                        "User account was created but the profile could not be saved: {}",
                        err.message()
                    ),
                    err,
                )
                .await;
        }
        info!(identity_id = %identity_id, step = "profile", "Profile created");
        committed.push(ProvisioningStep::Profile);

        match self
            .teams
            .create_membership(&request.team_id, &request.sub_roles, &account.email)
            .await
        {
            Ok(membership) => {
                info!(
                    identity_id = %identity_id,
                    membership_id = %membership.id,
                    confirmed = membership.confirmed,
                    step = "membership",
                    "Team invitation sent"
                );
            }
            Err(BackendError::Conflict(_)) => {
                info!(identity_id = %identity_id, step = "membership", "Already a team member");
            }
            Err(err @ BackendError::NotFound(_)) => {
                error!(identity_id = %identity_id, error = %err, "Team not found");
                return self
                    .fail_after(committed, &identity_id, "Team not found.".to_string(), err)
                    .await;
            }
            Err(err) => {
                error!(identity_id = %identity_id, error = %err, "Failed to invite user to team");
                return self
                    .fail_after(
                        committed,
                        &identity_id,
                        format!(
                            "User was created but could not be added to the team: {}",
                            err.message()
                        ),
                        err,
                    )
                    .await;
            }
        }

        ProvisionOutcome::succeeded(
            identity_id,
            format!(
                "User {} created successfully with role {}.",
                account.name, request.role_display_name
            ),
        )
    }

    fn profile_permissions(&self, identity_id: &str, actor: Option<&str>) -> Vec<Permission> {
        let mut permissions = Permission::owner(identity_id).to_vec();
        if let Some(actor) = actor.filter(|_| self.settings.grant_admin_access) {
            if actor != identity_id {
                permissions.push(Permission::Read(Role::User(actor.to_string())));
                permissions.push(Permission::Update(Role::User(actor.to_string())));
            }
        }
        permissions
    }

    /// Build the failure outcome for a step after the identity was created,
    /// compensating first when configured.
    async fn fail_after(
        &self,
        committed: Vec<ProvisioningStep>,
        identity_id: &str,
        message: String,
        err: BackendError,
    ) -> ProvisionOutcome {
        let mut outcome =
            ProvisionOutcome::failed(ErrorKind::UpstreamError, message, Some(err.to_string()));
        outcome.identity_id = Some(identity_id.to_string());

        if self.settings.compensate_on_failure {
            outcome.compensated_steps = self.compensate(&committed, identity_id).await;
        } else {
            warn!(
                identity_id = %identity_id,
                committed = ?committed,
                "Provisioning left partially applied"
            );
        }
        outcome.committed_steps = committed;
        outcome
    }

    /// Undo committed steps in reverse. Failures are logged and skipped.
    async fn compensate(
        &self,
        committed: &[ProvisioningStep],
        identity_id: &str,
    ) -> Vec<ProvisioningStep> {
        let mut undone = Vec::new();
        for step in committed.iter().rev() {
            let result = match step {
                ProvisioningStep::Profile => self.profiles.delete_document(identity_id).await,
                ProvisioningStep::Identity => self.identity.delete_account(identity_id).await,
                // never committed when a later step fails
                ProvisioningStep::Membership => continue,
            };
            match result {
                Ok(()) | Err(BackendError::NotFound(_)) => {
                    info!(identity_id = %identity_id, step = ?step, "Compensated provisioning step");
                    undone.push(*step);
                }
                Err(err) => {
                    error!(
                        identity_id = %identity_id,
                        step = ?step,
                        error = %err,
                        "Compensation failed"
                    );
                }
            }
        }
        undone
    }

    /// Delete a user's profile, then their identity.
    ///
    /// The identity is kept when the profile could not be deleted, unless
    /// `force` is set. Team memberships are left in place.
    #[instrument(skip(self))]
    pub async fn deprovision(&self, identity_id: &str, force: bool) -> DeprovisionOutcome {
        let outcome = self.run_deprovision(identity_id.trim(), force).await;
        metrics::record_outcome("deprovision", outcome.result_label());
        outcome
    }

    async fn run_deprovision(&self, identity_id: &str, force: bool) -> DeprovisionOutcome {
        if identity_id.is_empty() {
            return DeprovisionOutcome::failed(
                ErrorKind::ValidationError,
                "User id is required.",
                None,
                Vec::new(),
            );
        }
        if !is_valid_id(identity_id) {
            warn!(identity_id = %identity_id, "Rejected malformed identity id");
            return DeprovisionOutcome::failed(
                ErrorKind::ValidationError,
                "User id is invalid.",
                None,
                Vec::new(),
            );
        }

        let mut warnings = Vec::new();

        match self.profiles.delete_document(identity_id).await {
            Ok(()) => info!(identity_id = %identity_id, "Profile deleted"),
            Err(BackendError::NotFound(_)) => {
                warn!(identity_id = %identity_id, "Profile already absent");
                warnings.push(format!("Profile for user {} was already absent.", identity_id));
            }
            Err(err) if force => {
                warn!(identity_id = %identity_id, error = %err, "Profile deletion failed, forcing identity deletion");
                warnings.push(format!(
                    "Profile for user {} could not be deleted: {}",
                    identity_id,
                    err.message()
                ));
            }
            Err(err) => {
                error!(identity_id = %identity_id, error = %err, "Profile deletion failed, keeping identity");
                return DeprovisionOutcome::failed(
                    ErrorKind::UpstreamError,
                    "Failed to delete the user profile. The account was left in place.",
                    Some(err.to_string()),
                    warnings,
                );
            }
        }

        match self.identity.delete_account(identity_id).await {
            Ok(()) => info!(identity_id = %identity_id, "Identity deleted"),
            Err(BackendError::NotFound(_)) => {
                warn!(identity_id = %identity_id, "Identity already absent");
                warnings.push(format!("Account for user {} was already absent.", identity_id));
            }
            Err(err) => {
                error!(identity_id = %identity_id, error = %err, "Identity deletion failed");
                return DeprovisionOutcome::failed(
                    ErrorKind::UpstreamError,
                    "Failed to delete the user account.",
                    Some(err.to_string()),
                    warnings,
                );
            }
        }

        DeprovisionOutcome::succeeded("User deleted successfully.", warnings)
    }
}

fn profile_data(identity_id: &str, request: &ProvisionRequest, actor: Option<&str>) -> ProfileData {
    let text = |value: &Option<String>| value.as_deref().unwrap_or("").trim().to_string();
    ProfileData {
        user_id: identity_id.to_string(),
        full_name: request.full_name.trim().to_string(),
        email: request.email.trim().to_string(),
        phone: text(&request.phone),
        role: request.role.clone(),
        role_display_name: request.role_display_name.clone(),
        team_id: request.team_id.clone(),
        is_active: request.is_active.unwrap_or(true),
        address: text(&request.address),
        city: text(&request.city),
        country: text(&request.country),
        postal_code: text(&request.postal_code),
        profile_image_url: None,
        created_by: actor.map(str::to_string),
        updated_by: None,
    }
}

/// Offending fields in wire (camelCase) form, sorted.
fn invalid_fields(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|field| to_camel_case(field))
        .collect();
    fields.sort();
    fields
}

fn validation_message(errors: &ValidationErrors, fields: &[String]) -> String {
    let messages: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .collect();
    if messages.len() == 1 {
        format!("{}.", messages[0])
    } else {
        format!("Validation failed: {} are invalid.", fields.join(", "))
    }
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
