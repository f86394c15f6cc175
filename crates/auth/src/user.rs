//! Registered user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campuscart_core::{DomainError, DomainResult, Entity, UserId};

/// A registered customer.
///
/// Emails are stored lowercased; ids are compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// PHC-formatted Argon2 hash.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for UserAccount {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Sign-up request.
#[derive(Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub const MIN_PASSWORD_LEN: usize = 8;

impl NewAccount {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        normalize_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Trim + lowercase an email and check its basic shape.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("email is not valid"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str, email: &str, password: &str) -> NewAccount {
        NewAccount {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Asha@Campus.EDU ").unwrap(), "asha@campus.edu");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@campus.edu").is_err());
        assert!(normalize_email("asha@localhost").is_err());
    }

    #[test]
    fn new_account_validation() {
        assert!(account("Asha", "asha@campus.edu", "longenough").validate().is_ok());
        assert!(account(" ", "asha@campus.edu", "longenough").validate().is_err());
        assert!(account("Asha", "asha@campus.edu", "short").validate().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", account("Asha", "asha@campus.edu", "hunter2hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
