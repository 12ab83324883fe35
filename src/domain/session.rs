//! Single-active-session authority.
//!
//! Every account has at most one valid credential. Logging in, logging out
//! everywhere, and changing the password all mint a fresh credential and
//! overwrite the stored digest, which revokes every other outstanding
//! credential for that account.
//!
//! Only the SHA-256 digest of a token is persisted. Validation recomputes
//! the digest of the presented token and compares it in constant time.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Authentication failures. All but [`AuthError::Store`] mean the client
/// must log in again.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The request carried no credential.
    #[error("authentication required")]
    Unauthenticated,

    /// The credential is malformed or no longer the account's current one.
    #[error("session is no longer valid; log in again")]
    SessionRevoked,

    /// The account behind the credential no longer exists.
    #[error("account no longer exists")]
    AccountMissing,

    /// Username or password did not match.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The credential store could not be reached.
    #[error("credential store error: {0}")]
    Store(String),
}

/// What the store holds for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCredential {
    /// No such account.
    AccountMissing,
    /// The account exists but has never logged in.
    Empty,
    /// Digest of the account's current token.
    Digest(String),
}

/// Durable storage of per-account credential digests.
pub trait CredentialStore: Send + Sync + 'static {
    /// Loads the current credential digest for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store is unavailable.
    fn load_credential(
        &self,
        account: &str,
    ) -> impl Future<Output = Result<StoredCredential, AuthError>> + Send;

    /// Overwrites the credential digest for `account`. Returns `false` if
    /// the account does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store is unavailable.
    fn store_credential(
        &self,
        account: &str,
        digest: &str,
    ) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Checks `password` against the account's stored password hash.
    /// Unknown accounts yield `false`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store is unavailable.
    fn verify_password(
        &self,
        account: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Replaces the account's password. Returns `false` if the account
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store is unavailable.
    fn update_password(
        &self,
        account: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool, AuthError>> + Send;
}

/// A session credential held by the client.
///
/// Serialized as `<account>:<token>`. The token is base64url and never
/// contains `:`, so account names may.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    account: String,
    token: String,
}

impl SessionCredential {
    /// Mints a fresh credential for `account` from its name, the current
    /// time, and 32 random bytes.
    #[must_use]
    pub fn issue(account: &str) -> Self {
        let entropy: [u8; 32] = rand::random();
        let mut hasher = Sha256::new();
        hasher.update(account.as_bytes());
        hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.update(entropy);
        Self {
            account: account.to_string(),
            token: URL_SAFE_NO_PAD.encode(hasher.finalize()),
        }
    }

    /// Account this credential was issued to.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// One-way digest of the token, as persisted by the store.
    #[must_use]
    pub fn digest(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.token.as_bytes()))
    }
}

impl fmt::Display for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account, self.token)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("account", &self.account)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl FromStr for SessionCredential {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (account, token) = s.rsplit_once(':').ok_or(AuthError::SessionRevoked)?;
        if account.is_empty() || token.is_empty() {
            return Err(AuthError::SessionRevoked);
        }
        Ok(Self {
            account: account.to_string(),
            token: token.to_string(),
        })
    }
}

/// Issues, validates and revokes session credentials.
///
/// Holds no in-process state: the store's single-row update is the only
/// synchronization, and concurrent logins resolve as last write wins.
#[derive(Debug)]
pub struct SessionAuthority<S> {
    store: S,
}

impl<S: CredentialStore> SessionAuthority<S> {
    /// Creates an authority backed by `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Verifies the password and issues the account's new sole credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on a bad username or
    /// password, or [`AuthError::Store`] if the store fails.
    pub async fn login(&self, account: &str, password: &str) -> Result<SessionCredential, AuthError> {
        if !self.store.verify_password(account, password).await? {
            tracing::info!(account, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        let credential = self.rotate(account).await?;
        tracing::info!(account, "login succeeded");
        Ok(credential)
    }

    /// Confirms `credential` is its account's current one and the account
    /// still exists.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountMissing`] if the account is gone,
    /// [`AuthError::SessionRevoked`] on any digest mismatch, or
    /// [`AuthError::Store`] if the store fails.
    pub async fn validate(&self, credential: &SessionCredential) -> Result<(), AuthError> {
        let account = credential.account();
        match self.store.load_credential(account).await? {
            StoredCredential::AccountMissing => {
                tracing::warn!(account, "credential presented for missing account");
                Err(AuthError::AccountMissing)
            }
            StoredCredential::Empty => {
                tracing::warn!(account, "credential presented but none is stored");
                Err(AuthError::SessionRevoked)
            }
            StoredCredential::Digest(stored) => {
                let presented = credential.digest();
                if bool::from(presented.as_bytes().ct_eq(stored.as_bytes())) {
                    Ok(())
                } else {
                    tracing::warn!(account, "revoked credential presented");
                    Err(AuthError::SessionRevoked)
                }
            }
        }
    }

    /// Logs the account out everywhere by rotating its credential. The
    /// returned credential keeps the caller's own device signed in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountMissing`] if the account is gone, or
    /// [`AuthError::Store`] if the store fails.
    pub async fn invalidate_all(&self, account: &str) -> Result<SessionCredential, AuthError> {
        let credential = self.rotate(account).await?;
        tracing::info!(account, "all sessions invalidated");
        Ok(credential)
    }

    /// Changes the password after checking the current one, then rotates
    /// the credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if `current` is wrong,
    /// [`AuthError::AccountMissing`] if the account is gone, or
    /// [`AuthError::Store`] if the store fails.
    pub async fn change_password(
        &self,
        account: &str,
        current: &str,
        new_password: &str,
    ) -> Result<SessionCredential, AuthError> {
        if !self.store.verify_password(account, current).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !self.store.update_password(account, new_password).await? {
            return Err(AuthError::AccountMissing);
        }
        let credential = self.rotate(account).await?;
        tracing::info!(account, "password changed; other sessions invalidated");
        Ok(credential)
    }

    async fn rotate(&self, account: &str) -> Result<SessionCredential, AuthError> {
        let credential = SessionCredential::issue(account);
        if self.store.store_credential(account, &credential.digest()).await? {
            Ok(credential)
        } else {
            Err(AuthError::AccountMissing)
        }
    }
}

/// Hex-encoded SHA-256 of a password, the format kept in `users.password`.
#[must_use]
pub fn password_digest(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
