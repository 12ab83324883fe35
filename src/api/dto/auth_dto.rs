//! Request/response DTOs for account and session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::SessionCredential;

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Unique account name.
    pub username: String,
    /// Unique contact address.
    pub email: String,
    /// Plain-text password; only its digest is stored.
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

/// Request body for `POST /auth/password`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// Password currently on file.
    pub current_password: String,
    /// Replacement password.
    pub new_password: String,
}

/// Response carrying the account's freshly issued credential.
///
/// The credential must be sent back as `Authorization: Bearer <credential>`.
/// Any credential issued earlier for the same account is no longer valid.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Account the credential belongs to.
    pub account: String,
    /// Opaque `<account>:<token>` credential.
    pub credential: String,
}

impl From<SessionCredential> for SessionResponse {
    fn from(credential: SessionCredential) -> Self {
        Self {
            account: credential.account().to_string(),
            credential: credential.to_string(),
        }
    }
}

/// Response for `POST /auth/register`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisterResponse {
    /// Name of the created account.
    pub account: String,
}
