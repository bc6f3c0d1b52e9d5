use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::auth::{
    AuthResponse, LoginRequest, MessageResponse, PasswordRecoveryRequest, SignupRequest,
};
use crate::{utils::ValidatedJson, AppState};

const POST_LOGIN_REDIRECT: &str = "/dashboard";

/// Create a viewer account and start a session
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, session cookie set", body = AuthResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (jar, identity_id) = state.accounts.signup(jar, req).await?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            success: true,
            identity_id,
            redirect_to: POST_LOGIN_REDIRECT.to_string(),
        }),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (jar, identity_id) = state.accounts.login(jar, req).await?;
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            identity_id,
            redirect_to: POST_LOGIN_REDIRECT.to_string(),
        }),
    ))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out, session cookie removed", body = MessageResponse)
    ),
    tag = "Authentication",
    security(
        ("session_cookie" = [])
    )
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = state.accounts.logout(jar).await;
    (
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

/// Request a password recovery email
#[utoipa::path(
    post,
    path = "/auth/password-recovery",
    request_body = PasswordRecoveryRequest,
    responses(
        (status = 200, description = "Recovery email requested", body = MessageResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Backend failure", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_password_recovery(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordRecoveryRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.request_password_recovery(&req.email).await?;
    Ok(Json(MessageResponse {
        message: "If an account exists for this email, a recovery link has been sent."
            .to_string(),
    }))
}
