use std::sync::Arc;

use crate::auth::PasswordService;
use crate::cache::CacheStore;
use crate::error::{InboxError, InboxResult};
use crate::mailbox::Mailbox;

use super::{EmailUser, UserStore};

/// Entry point for inbox access: resolves users, checks passwords and opens
/// mailboxes.
///
/// Both stores are injected and shared; the directory owns neither. There is
/// no rate limiting or lockout on password checks.
pub struct UserDirectory<U, S> {
    users: Arc<U>,
    mail: Arc<S>,
    passwords: PasswordService,
}

impl<U: UserStore, S: CacheStore> UserDirectory<U, S> {
    pub fn new(users: Arc<U>, mail: Arc<S>, passwords: PasswordService) -> Self {
        Self {
            users,
            mail,
            passwords,
        }
    }

    /// Fetch the user for `address`, creating and persisting an unprotected
    /// one on first sight. Repeated calls return the same stored record.
    pub async fn lookup_or_create(&self, address: &str) -> InboxResult<EmailUser> {
        if let Some(user) = self.users.get(address).await? {
            return Ok(user);
        }

        log::info!("creating inbox user {}", address);
        let user = self.users.create(&EmailUser::unprotected(address)).await?;
        Ok(user)
    }

    pub fn check_password(&self, user: &EmailUser, candidate: &str) -> InboxResult<bool> {
        Ok(self
            .passwords
            .check_password(candidate, &user.password_hash)?)
    }

    /// Open the user's mailbox, checking `password` first if the inbox is
    /// protected. `password` is ignored for unprotected inboxes.
    pub async fn inbox(&self, user: &EmailUser, password: &str) -> InboxResult<Mailbox<S>> {
        if user.has_password() && !self.check_password(user, password)? {
            log::info!("rejected password for inbox {}", user.email_address);
            return Err(InboxError::PasswordProtected(user.email_address.clone()));
        }

        Mailbox::open(self.mail.clone(), &user.email_address).await
    }

    /// Set or change the inbox password and persist the user.
    ///
    /// Changing an existing password keeps the salt already stored in the
    /// hash; the first password gets a fresh salt.
    pub async fn set_password(&self, user: &mut EmailUser, plaintext: &str) -> InboxResult<()> {
        let hash = if user.has_password() {
            let existing = PasswordService::parse_hash(&user.password_hash)?;
            self.passwords.make_hash(plaintext, Some(&existing.salt))?
        } else {
            self.passwords.make_hash(plaintext, None)?
        };

        user.password_hash = hash;
        user.password_protected = true;
        self.users.save(user).await?;

        log::info!("password set for inbox {}", user.email_address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::passwords::test_service;
    use crate::cache::{MailRecord, MemoryStore};
    use crate::users::MemoryUserStore;

    fn directory() -> (
        UserDirectory<MemoryUserStore, MemoryStore>,
        Arc<MemoryUserStore>,
        Arc<MemoryStore>,
    ) {
        let users = Arc::new(MemoryUserStore::new());
        let mail = Arc::new(MemoryStore::new());
        mail.insert(
            "a@b.com",
            vec![MailRecord::new(1, "Subject: hello\r\n\r\nhi\r\n")],
        );
        let directory = UserDirectory::new(users.clone(), mail.clone(), test_service("secret"));
        (directory, users, mail)
    }

    #[tokio::test]
    async fn lookup_or_create_is_idempotent() {
        let (directory, users, _) = directory();

        let first = directory.lookup_or_create("new@b.com").await.unwrap();
        let second = directory.lookup_or_create("new@b.com").await.unwrap();

        assert_eq!(first, second);
        assert!(!first.has_password());
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn unprotected_inbox_opens_without_password() {
        let (directory, _, _) = directory();
        let user = directory.lookup_or_create("a@b.com").await.unwrap();

        let mailbox = directory.inbox(&user, "").await.unwrap();
        assert_eq!(mailbox.message_count(), 1);
    }

    #[tokio::test]
    async fn user_without_cached_mail_has_no_inbox() {
        let (directory, _, _) = directory();
        let user = directory.lookup_or_create("empty@b.com").await.unwrap();

        let err = directory.inbox(&user, "").await.err().unwrap();
        assert!(matches!(err, InboxError::NoSuchUser(_)));
    }

    #[tokio::test]
    async fn protected_inbox_requires_password() {
        let (directory, users, _) = directory();
        let mut user = directory.lookup_or_create("a@b.com").await.unwrap();
        directory.set_password(&mut user, "hunter2").await.unwrap();

        let stored = users.get("a@b.com").await.unwrap().unwrap();
        assert!(stored.has_password());
        assert_eq!(stored, user);

        let err = directory.inbox(&user, "wrong").await.err().unwrap();
        assert!(matches!(err, InboxError::PasswordProtected(addr) if addr == "a@b.com"));

        let err = directory.inbox(&user, "").await.err().unwrap();
        assert!(matches!(err, InboxError::PasswordProtected(_)));

        assert!(directory.inbox(&user, "hunter2").await.is_ok());
    }

    #[tokio::test]
    async fn changing_password_keeps_salt() {
        let (directory, _, _) = directory();
        let mut user = directory.lookup_or_create("a@b.com").await.unwrap();

        directory.set_password(&mut user, "first").await.unwrap();
        let first_salt = PasswordService::parse_hash(&user.password_hash)
            .unwrap()
            .salt;

        directory.set_password(&mut user, "second").await.unwrap();
        let second_salt = PasswordService::parse_hash(&user.password_hash)
            .unwrap()
            .salt;

        assert_eq!(first_salt.as_str(), second_salt.as_str());
        assert!(!directory.check_password(&user, "first").unwrap());
        assert!(directory.check_password(&user, "second").unwrap());
    }
}
