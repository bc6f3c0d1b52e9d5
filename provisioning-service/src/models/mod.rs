pub mod identity;
pub mod membership;
pub mod profile;
pub mod query;
pub mod session;

pub use identity::{is_valid_id, Identity, NewAccount};
pub use membership::Membership;
pub use profile::{Permission, ProfileData, ProfileRecord, ProfileUpdate, Role};
pub use query::Query;
pub use session::Session;
