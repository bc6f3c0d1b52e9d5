use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::backend::{Backend, ProfileStore, TeamClient};
use super::error::{BackendError, ServiceError};
use crate::dtos::profile::{AdminUpdateProfileRequest, UpdateProfileRequest};
use crate::dtos::users::ListUsersParams;
use crate::models::{is_valid_id, Identity, ProfileRecord, Query};

#[derive(Clone)]
pub struct ProfileService {
    profiles: Arc<dyn ProfileStore>,
    teams: Arc<dyn TeamClient>,
}

impl ProfileService {
    pub fn new(backend: &Backend) -> Self {
        Self {
            profiles: backend.profiles.clone(),
            teams: backend.teams.clone(),
        }
    }

    #[instrument(skip(self, identity), fields(identity_id = %identity.id))]
    pub async fn current_profile(&self, identity: &Identity) -> Result<ProfileRecord, ServiceError> {
        self.profiles
            .get_document(&identity.id)
            .await
            .map_err(|e| not_found_or_upstream(e, "Profile not found.", "Failed to load profile."))
    }

    /// Update the caller's own profile. A missing profile is an error, not an insert.
    #[instrument(skip(self, identity, request), fields(identity_id = %identity.id))]
    pub async fn update_own_profile(
        &self,
        identity: &Identity,
        request: UpdateProfileRequest,
    ) -> Result<ProfileRecord, ServiceError> {
        let update = request.into_update(&identity.email);
        let record = self
            .profiles
            .update_document(&identity.id, &update)
            .await
            .map_err(|e| {
                not_found_or_upstream(e, "Profile not found.", "Failed to update profile.")
            })?;
        info!("Profile updated");
        Ok(record)
    }

    /// Update another user's profile on behalf of an admin.
    ///
    /// Moving the user to a new team sends an invitation with the user's role.
    /// Invitation failures are logged and do not fail the update.
    #[instrument(skip(self, request))]
    pub async fn admin_update_profile(
        &self,
        admin_id: &str,
        target_id: &str,
        request: AdminUpdateProfileRequest,
    ) -> Result<ProfileRecord, ServiceError> {
        if !is_valid_id(target_id) {
            warn!(target_id = %target_id, "Rejected malformed user id");
            return Err(ServiceError::NotFound(
                "Profile not found for this user.".to_string(),
            ));
        }
        let current = self.profiles.get_document(target_id).await.map_err(|e| {
            not_found_or_upstream(
                e,
                "Profile not found for this user.",
                "Failed to load profile.",
            )
        })?;

        let update = request.into_update(admin_id);
        let new_team = update
            .team_id
            .clone()
            .filter(|team| *team != current.data.team_id);

        let record = self
            .profiles
            .update_document(target_id, &update)
            .await
            .map_err(|e| {
                not_found_or_upstream(
                    e,
                    "Profile not found for this user.",
                    "Failed to update profile.",
                )
            })?;
        info!(target_id = %target_id, "Profile updated by admin");

        if let Some(team_id) = new_team {
            let roles = vec![record.data.role.clone()];
            match self
                .teams
                .create_membership(&team_id, &roles, &record.data.email)
                .await
            {
                Ok(membership) => {
                    info!(team_id = %team_id, membership_id = %membership.id, "Invited user to new team")
                }
                Err(BackendError::Conflict(_)) => {
                    info!(team_id = %team_id, "User already in new team")
                }
                Err(err) => {
                    error!(team_id = %team_id, error = %err, "Failed to invite user to new team")
                }
            }
        }

        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn list_profiles(
        &self,
        filter: &ListUsersParams,
    ) -> Result<Vec<ProfileRecord>, ServiceError> {
        let mut queries = Vec::new();
        if let Some(role) = &filter.role {
            queries.push(Query::equal("role", role.as_str()));
        }
        if let Some(team_id) = &filter.team_id {
            queries.push(Query::equal("teamId", team_id.as_str()));
        }
        if let Some(active) = filter.is_active {
            queries.push(Query::equal("isActive", active));
        }

        self.profiles
            .list_documents(&queries)
            .await
            .map_err(|e| ServiceError::upstream("Failed to list users.", &e))
    }

    /// Load the caller's profile and check it grants admin access.
    #[instrument(skip(self, identity, admin_roles), fields(identity_id = %identity.id))]
    pub async fn require_admin(
        &self,
        identity: &Identity,
        admin_roles: &[String],
    ) -> Result<ProfileRecord, ServiceError> {
        let profile = match self.profiles.get_document(&identity.id).await {
            Ok(profile) => profile,
            Err(BackendError::NotFound(_)) => {
                warn!("Admin access denied: no profile");
                return Err(ServiceError::Forbidden);
            }
            Err(err) => return Err(ServiceError::upstream("Failed to load profile.", &err)),
        };

        if !profile.data.is_active || !admin_roles.iter().any(|r| *r == profile.data.role) {
            warn!(role = %profile.data.role, "Admin access denied");
            return Err(ServiceError::Forbidden);
        }
        Ok(profile)
    }
}

fn not_found_or_upstream(err: BackendError, not_found: &str, upstream: &str) -> ServiceError {
    match err {
        BackendError::NotFound(_) => ServiceError::NotFound(not_found.to_string()),
        other => ServiceError::upstream(upstream, &other),
    }
}
