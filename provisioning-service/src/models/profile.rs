//! Profile model - the application-level user document.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Profile attributes as stored in the profiles collection.
///
/// Optional contact fields are empty strings rather than absent, so readers
/// never have to distinguish "unset" from "blank".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(example = "viewer")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(example = "Viewer")]
    pub role_display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team_id: String,
    #[serde(default = "default_active", deserialize_with = "null_as_active")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl ProfileData {
    /// Apply a partial update in place. Absent fields are left untouched.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut self.full_name, &update.full_name);
        set(&mut self.email, &update.email);
        set(&mut self.phone, &update.phone);
        set(&mut self.role, &update.role);
        set(&mut self.role_display_name, &update.role_display_name);
        set(&mut self.team_id, &update.team_id);
        set(&mut self.address, &update.address);
        set(&mut self.city, &update.city);
        set(&mut self.country, &update.country);
        set(&mut self.postal_code, &update.postal_code);
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        if update.profile_image_url.is_some() {
            self.profile_image_url = update.profile_image_url.clone();
        }
        if update.updated_by.is_some() {
            self.updated_by = update.updated_by.clone();
        }
    }
}

/// A stored profile document: its id plus attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[schema(example = "u1")]
    pub id: String,
    #[serde(flatten)]
    pub data: ProfileData,
}

/// Partial profile update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// Principal a permission is granted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// A single identity.
    User(String),
    /// Every member of a team.
    Team(String),
    /// Any authenticated identity.
    Users,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User(id) => write!(f, "user:{}", id),
            Role::Team(id) => write!(f, "team:{}", id),
            Role::Users => write!(f, "users"),
        }
    }
}

/// Document-level access grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Read(Role),
    Update(Role),
    Delete(Role),
}

impl Permission {
    /// Read and update for the owning identity.
    pub fn owner(identity_id: &str) -> [Permission; 2] {
        [
            Permission::Read(Role::User(identity_id.to_string())),
            Permission::Update(Role::User(identity_id.to_string())),
        ]
    }
}

/// Rendered in the backend's wire format, e.g. `read("user:u1")`.
impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Read(role) => write!(f, "read(\"{}\")", role),
            Permission::Update(role) => write!(f, "update(\"{}\")", role),
            Permission::Delete(role) => write!(f, "delete(\"{}\")", role),
        }
    }
}

fn default_active() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_active<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_render_in_wire_format() {
        let [read, update] = Permission::owner("u1");
        assert_eq!(read.to_string(), r#"read("user:u1")"#);
        assert_eq!(update.to_string(), r#"update("user:u1")"#);
        assert_eq!(
            Permission::Read(Role::Team("admins".into())).to_string(),
            r#"read("team:admins")"#
        );
    }

    #[test]
    fn nulls_in_stored_document_become_defaults() {
        let json = serde_json::json!({
            "userId": "u1",
            "fullName": "Alice",
            "email": "alice@example.com",
            "phone": null,
            "role": "editor",
            "roleDisplayName": "Editor",
            "teamId": "t1",
            "isActive": null,
            "address": null,
            "$permissions": ["read(\"user:u1\")"]
        });
        let data: ProfileData = serde_json::from_value(json).unwrap();
        assert_eq!(data.phone, "");
        assert_eq!(data.address, "");
        assert!(data.is_active);
        assert_eq!(data.profile_image_url, None);
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut data: ProfileData = serde_json::from_value(serde_json::json!({
            "userId": "u1",
            "fullName": "Alice",
            "email": "alice@example.com",
            "role": "editor",
            "roleDisplayName": "Editor",
            "teamId": "t1",
            "city": "Lagos"
        }))
        .unwrap();

        data.apply(&ProfileUpdate {
            phone: Some("+2348000000000".into()),
            is_active: Some(false),
            ..Default::default()
        });

        assert_eq!(data.phone, "+2348000000000");
        assert!(!data.is_active);
        assert_eq!(data.city, "Lagos");
        assert_eq!(data.full_name, "Alice");
    }

    #[test]
    fn update_serializes_only_present_fields() {
        let update = ProfileUpdate {
            full_name: Some("Bob".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "fullName": "Bob" })
        );
        assert_eq!(
            serde_json::to_value(ProfileUpdate::default()).unwrap(),
            serde_json::json!({})
        );
    }
}
