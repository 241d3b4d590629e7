use serde::Serialize;

/// Per-address inbox settings persisted in the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct EmailUser {
    pub email_address: String,
    pub password_protected: bool,
    /// Keyed PHC hash string; empty while unprotected
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl EmailUser {
    /// A fresh, unprotected user for `email_address`.
    pub fn unprotected(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            password_protected: false,
            password_hash: String::new(),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_protected
    }
}
