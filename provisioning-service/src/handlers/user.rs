use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::profile::UpdateProfileRequest, middleware::CurrentUser, utils::ValidatedJson, AppState,
};

/// Identity behind the session cookie
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current identity", body = Identity),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn get_me(CurrentUser(identity): CurrentUser) -> impl IntoResponse {
    Json(identity)
}

/// Profile of the current user
#[utoipa::path(
    get,
    path = "/users/me/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileRecord),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn get_my_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.profiles.current_profile(&identity).await?;
    Ok(Json(profile))
}

/// Update the current user's contact details
#[utoipa::path(
    patch,
    path = "/users/me/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileRecord),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn update_my_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.profiles.update_own_profile(&identity, req).await?;
    Ok(Json(profile))
}
