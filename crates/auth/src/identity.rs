//! Identity oracle boundary.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use campuscart_core::{DomainError, UserId};

use crate::user::NewAccount;

/// Login credentials.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password (deliberately indistinguishable).
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("password hashing failed")]
    PasswordHash,

    #[error("identity store failure: {0}")]
    Store(String),
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        AuthError::Validation(value.to_string())
    }
}

/// Resolves credentials to user ids.
///
/// Implementations own persistence; callers only ever see ids.
#[async_trait]
pub trait IdentityOracle: Send + Sync {
    /// Create an account and return its id.
    async fn register(&self, account: NewAccount) -> Result<UserId, AuthError>;

    /// Check credentials and return the matching user id.
    async fn authenticate(&self, credentials: &Credentials) -> Result<UserId, AuthError>;
}

#[async_trait]
impl<T> IdentityOracle for std::sync::Arc<T>
where
    T: IdentityOracle + ?Sized,
{
    async fn register(&self, account: NewAccount) -> Result<UserId, AuthError> {
        (**self).register(account).await
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<UserId, AuthError> {
        (**self).authenticate(credentials).await
    }
}
