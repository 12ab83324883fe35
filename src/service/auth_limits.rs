//! Abuse limits on the unauthenticated account routes.
//!
//! Login and registration have no session to key on, so attempts are
//! counted per submitted username, each action against its own
//! per-minute cap.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::{RateDecision, RateLimiter};
use crate::error::AppError;

/// Rate-limited action: password login.
pub const LOGIN: &str = "login";
/// Rate-limited action: account registration.
pub const REGISTER: &str = "register";

const MINUTE: Duration = Duration::from_secs(60);

/// Records one `action` by `subject` on `limiter`, or rejects it if the
/// window is full.
///
/// # Errors
///
/// Returns [`AppError::RateLimited`] carrying the time until a slot frees
/// up.
pub fn enforce(limiter: &RateLimiter, subject: &str, action: &str) -> Result<(), AppError> {
    match limiter.check(subject, action) {
        RateDecision::Allowed => Ok(()),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(subject, action, ?retry_after, "rate limit exceeded");
            Err(AppError::RateLimited {
                action: action.to_string(),
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}

/// Per-minute caps on login and registration attempts.
#[derive(Debug, Clone)]
pub struct AuthLimits {
    login: Arc<RateLimiter>,
    register: Arc<RateLimiter>,
}

impl AuthLimits {
    /// Admits `login_per_minute` logins and `register_per_minute`
    /// registrations per username.
    #[must_use]
    pub fn new(login_per_minute: usize, register_per_minute: usize) -> Self {
        Self {
            login: Arc::new(RateLimiter::new(login_per_minute, MINUTE)),
            register: Arc::new(RateLimiter::new(register_per_minute, MINUTE)),
        }
    }

    /// Counts a login attempt for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RateLimited`] once the minute's attempts are
    /// spent.
    pub fn check_login(&self, username: &str) -> Result<(), AppError> {
        enforce(&self.login, &subject(username), LOGIN)
    }

    /// Counts a registration attempt for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RateLimited`] once the minute's attempts are
    /// spent.
    pub fn check_register(&self, username: &str) -> Result<(), AppError> {
        enforce(&self.register, &subject(username), REGISTER)
    }

    /// Starts one sweeper per limiter.
    #[must_use]
    pub fn spawn_sweepers(&self, every: Duration) -> [JoinHandle<()>; 2] {
        [
            self.login.spawn_sweeper(every),
            self.register.spawn_sweeper(every),
        ]
    }
}

impl Default for AuthLimits {
    fn default() -> Self {
        Self::new(10, 5)
    }
}

fn subject(username: &str) -> String {
    username.trim().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn login_allows_ten_per_minute() {
        let limits = AuthLimits::default();
        for n in 0..10 {
            assert!(limits.check_login("alice").is_ok(), "attempt {n} should pass");
        }
        let Err(AppError::RateLimited { action, .. }) = limits.check_login("Alice ") else {
            panic!("eleventh attempt should be limited");
        };
        assert_eq!(action, LOGIN);
        assert!(limits.check_login("bob").is_ok());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limits.check_login("alice").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn register_allows_five_per_minute_independently() {
        let limits = AuthLimits::default();
        for _ in 0..5 {
            assert!(limits.check_register("carol").is_ok());
        }
        assert!(matches!(
            limits.check_register("carol"),
            Err(AppError::RateLimited { .. })
        ));
        assert!(limits.check_login("carol").is_ok());
    }
}
