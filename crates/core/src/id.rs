//! Strongly-typed identifiers used across the domain.
//!
//! All identifiers are opaque strings. They are compared **exactly**
//! (case-sensitive) everywhere, including order-history lookups.
//! Generated identifiers are UUIDv7 based and carry a prefix that keeps
//! orders, users and sessions distinguishable from catalog product ids.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a catalog product (assigned by the catalog, not generated here).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

/// Identifier of a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Identifier of a committed order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

/// Identifier of a login session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse and validate an identifier.
            pub fn parse(value: impl AsRef<str>) -> Result<Self, DomainError> {
                let value = value.as_ref().trim();
                if value.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                if value.chars().any(char::is_whitespace) {
                    return Err(DomainError::invalid_id(format!(
                        "{}: contains whitespace",
                        $name
                    )));
                }
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

macro_rules! impl_generated_id {
    ($t:ty, $prefix:literal) => {
        impl $t {
            /// Prefix carried by every generated identifier of this kind.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh identifier.
            ///
            /// Uses UUIDv7 (time-ordered), so ids generated later sort later.
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, Uuid::now_v7().simple()))
            }
        }
    };
}

impl_string_newtype!(ProductId, "ProductId");
impl_string_newtype!(UserId, "UserId");
impl_string_newtype!(OrderId, "OrderId");
impl_string_newtype!(SessionId, "SessionId");

impl_generated_id!(UserId, "usr_");
impl_generated_id!(OrderId, "ord_");
impl_generated_id!(SessionId, "ses_");
