use thiserror::Error;

use crate::auth::AuthError;
use crate::cache::CacheError;

pub type InboxResult<T> = Result<T, InboxError>;

/// Failures surfaced by mailbox and user operations.
///
/// `NoSuchUser`, `NoSuchMessage` and `PasswordProtected` are ordinary outcomes
/// the caller is expected to handle. `Cache` means the store could not be
/// reached or misbehaved, which is not the same thing as an absent inbox.
#[derive(Debug, Error)]
pub enum InboxError {
    #[error("no mailbox for {0}")]
    NoSuchUser(String),
    #[error("no message with id {0}")]
    NoSuchMessage(i64),
    #[error("inbox {0} is password protected")]
    PasswordProtected(String),
    #[error("address `{0}` is not ASCII")]
    InvalidAddress(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl InboxError {
    /// True for failures of the backing stores rather than of the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            InboxError::Cache(CacheError::Unavailable(_)) | InboxError::Database(_)
        )
    }
}
