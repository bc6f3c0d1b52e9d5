use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        profile::AdminUpdateProfileRequest,
        users::{DeprovisionParams, ListUsersParams, ProvisionRequest, UserListResponse},
    },
    middleware::CurrentUser,
    utils::ValidatedJson,
    AppState,
};

/// Provision a user: identity, profile and team invitation
///
/// The body is validated by the orchestrator so that failures come back as a
/// provisioning outcome.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = ProvisionRequest,
    responses(
        (status = 201, description = "User provisioned", body = ProvisionOutcome),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ProvisionOutcome),
        (status = 422, description = "Validation error", body = ProvisionOutcome),
        (status = 502, description = "Backend failure, possibly after partial provisioning", body = ProvisionOutcome)
    ),
    tag = "Admin",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Json(req): Json<ProvisionRequest>,
) -> impl IntoResponse {
    state.provisioning.provision(req, Some(&admin.id)).await
}

/// Delete a user's profile and account
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(
        ("id" = String, Path, description = "Identity id"),
        DeprovisionParams
    ),
    responses(
        (status = 200, description = "User deleted, possibly with warnings", body = DeprovisionOutcome),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = DeprovisionOutcome)
    ),
    tag = "Admin",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<String>,
    Query(params): Query<DeprovisionParams>,
) -> impl IntoResponse {
    tracing::info!(actor = %admin.id, target_id = %id, force = params.force, "Deprovisioning user");
    state.provisioning.deprovision(&id, params.force).await
}

/// List user profiles
#[utoipa::path(
    get,
    path = "/admin/users",
    params(ListUsersParams),
    responses(
        (status = 200, description = "Matching profiles", body = UserListResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListUsersParams>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.profiles.list_profiles(&params).await?;
    Ok(Json(UserListResponse {
        total: users.len(),
        users,
    }))
}

/// Update another user's profile
#[utoipa::path(
    patch,
    path = "/admin/users/{id}/profile",
    params(
        ("id" = String, Path, description = "Identity id")
    ),
    request_body = AdminUpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileRecord),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn update_user_profile(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<AdminUpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .profiles
        .admin_update_profile(&admin.id, &id, req)
        .await?;
    Ok(Json(profile))
}
