//! Inbox password protection: keyed hashing and its errors.

pub mod error;
pub mod passwords;

pub use error::{AuthError, AuthResult};
pub use passwords::{ParsedHash, PasswordService};
