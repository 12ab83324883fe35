//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::{AuthError, SessionCredential};
use crate::error::AppError;

/// A request whose `Authorization: Bearer` credential is the account's
/// current one.
///
/// Rejects with [`AuthError::Unauthenticated`] when no header is present
/// and with [`AuthError::SessionRevoked`] when a credential was presented
/// but cannot be parsed or has been superseded.
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionCredential);

impl AuthSession {
    /// Account the session belongs to.
    #[must_use]
    pub fn account(&self) -> &str {
        self.0.account()
    }
}

/// Parses the credential out of an `Authorization` header value.
fn bearer_credential(value: &str) -> Result<SessionCredential, AuthError> {
    value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::SessionRevoked)?
        .trim()
        .parse()
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::Unauthenticated)?;
        let value = header.to_str().map_err(|_| AuthError::SessionRevoked)?;
        let credential = bearer_credential(value)?;

        state.sessions.validate(&credential).await?;
        Ok(Self(credential))
    }
}
