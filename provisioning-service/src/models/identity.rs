//! Identity model - an authentication account in the identity service.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// An authentication account as seen by this service.
///
/// The id is assigned by the identity service and is also used as the
/// profile document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[schema(example = "u1")]
    pub id: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "Alice Smith")]
    pub name: String,
    #[serde(default)]
    pub email_verified: bool,
}

/// Input for creating an identity.
///
/// `user_id` is optional; the identity service picks an id when it is absent.
#[derive(Clone)]
pub struct NewAccount {
    pub user_id: Option<String>,
    pub email: String,
    pub password: String,
    pub name: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// Appwrite resource ids: up to 36 of `[A-Za-z0-9._-]`, starting with a
/// letter or digit. Rules out `.`, `..` and anything containing `/`.
pub fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    id.len() <= 36 && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
