use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::backend::IdentityService;
use super::error::BackendError;
use crate::config::SessionConfig;
use crate::models::{Identity, Session};

/// Maps the session cookie to the identity behind it.
#[derive(Clone)]
pub struct SessionResolver {
    identity: Arc<dyn IdentityService>,
    cookie: SessionConfig,
}

impl SessionResolver {
    pub fn new(identity: Arc<dyn IdentityService>, cookie: SessionConfig) -> Self {
        Self { identity, cookie }
    }

    /// The session secret carried by the request, if any.
    pub fn token(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.cookie.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Resolve the current identity.
    ///
    /// An unauthorized response clears the cookie. Any other failure is
    /// treated as transient: the cookie is kept and no identity is returned.
    #[instrument(skip_all)]
    pub async fn resolve(&self, jar: CookieJar) -> (CookieJar, Option<Identity>) {
        let Some(token) = self.token(&jar) else {
            debug!("No session cookie");
            return (jar, None);
        };

        match self.identity.get_current_user(&token).await {
            Ok(identity) => (jar, Some(identity)),
            Err(BackendError::Unauthorized(msg)) => {
                info!(reason = %msg, "Session expired or invalid, clearing cookie");
                (self.clear(jar), None)
            }
            Err(err) => {
                warn!(error = %err, "Could not resolve session, keeping cookie");
                (jar, None)
            }
        }
    }

    /// Store a new session secret in the cookie.
    pub fn issue(&self, jar: CookieJar, session: &Session) -> CookieJar {
        let cookie = Cookie::build((self.cookie.cookie_name.clone(), session.secret.clone()))
            .path("/")
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(self.cookie.max_age_days));
        jar.add(cookie)
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build((self.cookie.cookie_name.clone(), "")).path("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAccount;
    use crate::services::memory::{InMemoryBackend, Operation};

    fn config() -> SessionConfig {
        SessionConfig {
            cookie_name: "appwrite-session".to_string(),
            max_age_days: 30,
            secure: false,
        }
    }

    #[tokio::test]
    async fn no_cookie_means_no_remote_call() {
        let backend = Arc::new(InMemoryBackend::new());
        let resolver = SessionResolver::new(backend.clone(), config());

        let (_, identity) = resolver.resolve(CookieJar::new()).await;

        assert!(identity.is_none());
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn issued_cookie_has_session_attributes() {
        let backend = Arc::new(InMemoryBackend::new());
        let resolver = SessionResolver::new(backend.clone(), config());
        let session = Session {
            id: "s1".into(),
            user_id: "u1".into(),
            secret: "secret".into(),
            expires_at: None,
        };

        let jar = resolver.issue(CookieJar::new(), &session);
        let cookie = jar.get("appwrite-session").unwrap();

        assert_eq!(cookie.value(), "secret");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));
    }

    #[tokio::test]
    async fn transient_failure_keeps_cookie() {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .create_account(&NewAccount {
                user_id: None,
                email: "a@x.com".into(),
                password: "longenough1".into(),
                name: "A".into(),
            })
            .await
            .unwrap();
        let session = backend.create_session("a@x.com", "longenough1").await.unwrap();
        let resolver = SessionResolver::new(backend.clone(), config());
        let jar = resolver.issue(CookieJar::new(), &session);

        backend.fail_next(
            Operation::GetCurrentUser,
            BackendError::Unavailable("connection reset".into()),
        );
        let (jar, identity) = resolver.resolve(jar).await;

        assert!(identity.is_none());
        assert!(resolver.token(&jar).is_some());

        let (_, identity) = resolver.resolve(jar).await;
        assert_eq!(identity.map(|i| i.id), Some("u1".to_string()));
    }
}
