use serde::Serialize;
use utoipa::ToSchema;

/// A team membership or pending invitation.
///
/// `confirmed` is false until the invitee accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub team_id: String,
    pub user_email: String,
    pub roles: Vec<String>,
    pub confirmed: bool,
}
