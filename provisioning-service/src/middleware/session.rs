use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{models::Identity, services::ServiceError, AppState};

/// Middleware to require a live session.
///
/// An expired session gets its cookie cleared on the 401 response.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let (jar, identity) = state.sessions.resolve(jar).await;

    match identity {
        Some(identity) => {
            tracing::Span::current().record("identity_id", identity.id.as_str());
            req.extensions_mut().insert(identity);
            (jar, next.run(req).await).into_response()
        }
        None => (jar, AppError::from(ServiceError::Unauthorized)).into_response(),
    }
}

/// Middleware for `/admin/*`. Runs inside [`session_middleware`].
pub async fn admin_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or_else(|| AppError::from(ServiceError::Unauthorized))?;

    state
        .profiles
        .require_admin(&identity, &state.config.security.admin_roles)
        .await?;

    Ok(next.run(req).await)
}

/// Extractor for the identity resolved by [`session_middleware`].
pub struct CurrentUser(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::from(ServiceError::Unauthorized))
    }
}
