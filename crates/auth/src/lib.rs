//! `campuscart-auth`: identity and session boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the store
//! backed identity lives in `campuscart-infra`, the HTTP extractors in the api.

pub mod identity;
pub mod password;
pub mod session;
pub mod user;

pub use identity::{AuthError, Credentials, IdentityOracle};
pub use session::{Session, SessionRegistry};
pub use user::{NewAccount, UserAccount};
