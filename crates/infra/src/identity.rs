//! Store-backed identity oracle.

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use campuscart_auth::user::normalize_email;
use campuscart_auth::{AuthError, Credentials, IdentityOracle, NewAccount, UserAccount, password};
use campuscart_core::UserId;

use crate::store::{CommerceStore, StoreError};

/// `IdentityOracle` over the store's user collection with Argon2 hashes.
///
/// Hashing runs on the blocking pool so request handlers are not stalled.
#[derive(Debug, Clone)]
pub struct StoreIdentity<S> {
    store: S,
}

impl<S> StoreIdentity<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

fn store_error(err: StoreError) -> AuthError {
    match err {
        StoreError::Conflict(_) => AuthError::EmailTaken,
        other => AuthError::Store(other.to_string()),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|_| AuthError::PasswordHash)?
}

#[async_trait]
impl<S> IdentityOracle for StoreIdentity<S>
where
    S: CommerceStore,
{
    #[instrument(skip(self, account), fields(email = %account.email))]
    async fn register(&self, account: NewAccount) -> Result<UserId, AuthError> {
        account.validate()?;
        let email = normalize_email(&account.email)?;

        if self.store.get_user_by_email(&email).await.map_err(store_error)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let secret = account.password;
        let password_hash = blocking(move || password::hash_password(&secret)).await?;

        let user = UserAccount {
            id: UserId::generate(),
            name: account.name.trim().to_string(),
            email,
            password_hash,
            created_at: Utc::now(),
        };
        // The unique index still decides if two registrations race.
        self.store.insert_user(&user).await.map_err(store_error)?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user.id)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<UserId, AuthError> {
        let email = normalize_email(&credentials.email).map_err(|_| AuthError::InvalidCredentials)?;
        let Some(user) = self.store.get_user_by_email(&email).await.map_err(store_error)? else {
            tracing::debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let secret = credentials.password.clone();
        let hash = user.password_hash.clone();
        blocking(move || password::verify_password(&secret, &hash)).await?;
        Ok(user.id)
    }
}
