//! Persistence for [`EmailUser`] records.

use std::future::Future;

use dashmap::DashMap;
use sqlx::PgPool;

use super::EmailUser;

/// Keyed record store for inbox users.
pub trait UserStore: Send + Sync {
    fn get(
        &self,
        email_address: &str,
    ) -> impl Future<Output = Result<Option<EmailUser>, sqlx::Error>> + Send;

    /// Insert `user` unless a record for the address already exists, and
    /// return whichever record is stored afterwards.
    fn create(
        &self,
        user: &EmailUser,
    ) -> impl Future<Output = Result<EmailUser, sqlx::Error>> + Send;

    /// Insert or update the record for `user.email_address`.
    fn save(&self, user: &EmailUser) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

const SELECT_USER: &str = r#"SELECT email_address, password_protected, password_hash
       FROM email_users
       WHERE email_address = $1"#;

/// Postgres-backed user store (`email_users` table).
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl UserStore for PgUserStore {
    async fn get(&self, email_address: &str) -> Result<Option<EmailUser>, sqlx::Error> {
        sqlx::query_as::<_, EmailUser>(SELECT_USER)
            .bind(email_address)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create(&self, user: &EmailUser) -> Result<EmailUser, sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO email_users (email_address, password_protected, password_hash)
               VALUES ($1, $2, $3)
               ON CONFLICT (email_address) DO NOTHING"#,
        )
        .bind(&user.email_address)
        .bind(user.password_protected)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, EmailUser>(SELECT_USER)
            .bind(&user.email_address)
            .fetch_one(&self.pool)
            .await
    }

    async fn save(&self, user: &EmailUser) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO email_users (email_address, password_protected, password_hash)
               VALUES ($1, $2, $3)
               ON CONFLICT (email_address) DO UPDATE SET
                   password_protected = EXCLUDED.password_protected,
                   password_hash = EXCLUDED.password_hash,
                   updated_at = NOW()"#,
        )
        .bind(&user.email_address)
        .bind(user.password_protected)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-process user store for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<String, EmailUser>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for MemoryUserStore {
    async fn get(&self, email_address: &str) -> Result<Option<EmailUser>, sqlx::Error> {
        Ok(self.users.get(email_address).map(|entry| entry.value().clone()))
    }

    async fn create(&self, user: &EmailUser) -> Result<EmailUser, sqlx::Error> {
        let stored = self
            .users
            .entry(user.email_address.clone())
            .or_insert_with(|| user.clone());
        Ok(stored.value().clone())
    }

    async fn save(&self, user: &EmailUser) -> Result<(), sqlx::Error> {
        self.users.insert(user.email_address.clone(), user.clone());
        Ok(())
    }
}
