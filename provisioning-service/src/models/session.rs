use chrono::{DateTime, Utc};
use std::fmt;

/// A session opened with the identity service.
///
/// `secret` is the opaque token stored in the session cookie.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
