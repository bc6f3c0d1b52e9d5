use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::ProfileUpdate;

/// Fields a user may change on their own profile.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Full name cannot be empty"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    #[validate(url(message = "Invalid profile image URL"))]
    pub profile_image_url: Option<String>,
}

impl UpdateProfileRequest {
    /// Email is pinned to the identity's address. Activation is admin-only and left untouched.
    pub fn into_update(self, email: &str) -> ProfileUpdate {
        ProfileUpdate {
            full_name: self.full_name,
            email: Some(email.to_string()),
            phone: self.phone,
            address: self.address,
            city: self.city,
            country: self.country,
            postal_code: self.postal_code,
            profile_image_url: self.profile_image_url,
            ..Default::default()
        }
    }
}

/// Admin edit of another user's profile.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateProfileRequest {
    #[validate(length(min = 1, message = "Full name cannot be empty"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Role cannot be empty"))]
    pub role: Option<String>,
    #[validate(length(min = 1, message = "Role display name cannot be empty"))]
    pub role_display_name: Option<String>,
    #[validate(
        length(min = 1, message = "Team cannot be empty"),
        custom(function = "crate::dtos::users::validate_resource_id")
    )]
    pub team_id: Option<String>,
    pub is_active: Option<bool>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl AdminUpdateProfileRequest {
    pub fn into_update(self, admin_id: &str) -> ProfileUpdate {
        ProfileUpdate {
            full_name: self.full_name,
            phone: self.phone,
            role: self.role,
            role_display_name: self.role_display_name,
            team_id: self.team_id,
            is_active: self.is_active,
            address: self.address,
            city: self.city,
            country: self.country,
            postal_code: self.postal_code,
            updated_by: Some(admin_id.to_string()),
            ..Default::default()
        }
    }
}
