//! Account and session handlers: register, login, logout, logout
//! everywhere, password change.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, RegisterResponse, SessionResponse,
};
use crate::api::extract::AuthSession;
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};

/// `POST /auth/register` — Create an account.
///
/// # Errors
///
/// Returns [`AppError::RateLimited`] after too many attempts for the
/// username, or [`AppError::InvalidRequest`] on empty fields or a taken
/// username or email.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    summary = "Register an account",
    description = "Creates an account with the default role and zero points.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing fields or name taken", body = ErrorResponse),
        (status = 429, description = "Too many registrations for this username", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_limits.check_register(&req.username)?;
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidRequest(
            "username, email and password are required".to_string(),
        ));
    }

    let created = state
        .sessions
        .store()
        .register(username, email, &req.password)
        .await?;
    if !created {
        return Err(AppError::InvalidRequest(
            "username or email already taken".to_string(),
        ));
    }

    tracing::info!(account = username, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account: username.to_string(),
        }),
    ))
}

/// `POST /auth/login` — Exchange a password for the account's sole valid
/// credential.
///
/// # Errors
///
/// Returns [`AppError::RateLimited`] after too many attempts for the
/// username, or [`AppError::Auth`] on a bad username or password.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    summary = "Log in",
    description = "Issues a fresh credential and revokes every credential issued earlier for the account.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SessionResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 429, description = "Too many login attempts for this username", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_limits.check_login(&req.username)?;
    let credential = state.sessions.login(req.username.trim(), &req.password).await?;
    Ok(Json(SessionResponse::from(credential)))
}

/// `POST /auth/logout` — Log out this device.
///
/// The stored credential is left untouched; the client discards its copy.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    summary = "Log out this device",
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
    )
)]
pub async fn logout(session: AuthSession) -> StatusCode {
    tracing::debug!(account = session.account(), "logged out on one device");
    StatusCode::NO_CONTENT
}

/// `POST /auth/logout-all` — Revoke every session of the account except the
/// caller's, which receives the replacement credential.
///
/// # Errors
///
/// Returns [`AppError::Auth`] if the presented session is not valid.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    tag = "Auth",
    summary = "Log out everywhere",
    description = "Rotates the account's credential. Every other device must log in again.",
    responses(
        (status = 200, description = "Replacement credential", body = SessionResponse),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
    )
)]
pub async fn logout_all(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<impl IntoResponse, AppError> {
    let credential = state.sessions.invalidate_all(session.account()).await?;
    Ok(Json(SessionResponse::from(credential)))
}

/// `POST /auth/password` — Change the password and revoke other sessions.
///
/// # Errors
///
/// Returns [`AppError::Auth`] if the session or current password is not
/// valid, or [`AppError::InvalidRequest`] on an empty new password.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password",
    tag = "Auth",
    summary = "Change password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Replacement credential", body = SessionResponse),
        (status = 400, description = "Empty new password", body = ErrorResponse),
        (status = 401, description = "Session or current password invalid", body = ErrorResponse),
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.new_password.is_empty() {
        return Err(AppError::InvalidRequest(
            "new_password is required".to_string(),
        ));
    }
    let credential = state
        .sessions
        .change_password(session.account(), &req.current_password, &req.new_password)
        .await?;
    Ok(Json(SessionResponse::from(credential)))
}

/// Auth routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
        .route("/auth/password", post(change_password))
}
