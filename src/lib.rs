//! Cache-backed webmail inboxes.
//!
//! Each user's inbox is one list of raw mail records stored under their
//! address in a shared cache. [`Mailbox`] takes a snapshot of that list and
//! offers listing, lookup by id and deletion; [`Message`] parses a record and
//! renders it for display; [`UserDirectory`] gates access behind optional
//! per-inbox passwords kept in Postgres.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod migration;
pub mod users;

use env_logger::Env;
use std::sync::Once;

pub use cache::{CacheError, CacheStore, MailRecord, MemcachedStore, MemoryStore};
pub use config::{ConfigError, InboxConfig};
pub use error::{InboxError, InboxResult};
pub use mailbox::Mailbox;
pub use message::{MailboxListing, Message, MessageTransportRecord, Payload};
pub use users::{EmailUser, MemoryUserStore, PgUserStore, UserDirectory, UserStore};

static LOGGER: Once = Once::new();

/// Install the `env_logger` backend once; `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    //! Ephemeral Postgres databases for integration tests.

    use rand::Rng;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use sqlx::{ConnectOptions, PgPool};
    use thiserror::Error;

    use crate::migration::MIGRATOR;

    #[derive(Debug, Error)]
    pub enum TestDatabaseError {
        #[error("TEST_DATABASE_URL not set")]
        MissingUrl,
        #[error("database error: {0}")]
        Sqlx(#[from] sqlx::Error),
        #[error("migration error: {0}")]
        Migration(#[from] sqlx::migrate::MigrateError),
    }

    /// A freshly created, migrated database on the server named by
    /// `TEST_DATABASE_URL`, dropped again by [`TestDatabase::close`].
    pub struct TestDatabase {
        pool: PgPool,
        admin_options: PgConnectOptions,
        database_name: String,
    }

    impl TestDatabase {
        pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
            let url =
                std::env::var("TEST_DATABASE_URL").map_err(|_| TestDatabaseError::MissingUrl)?;
            let base_options: PgConnectOptions = url.parse()?;
            let base_options = base_options.log_statements(log::LevelFilter::Off);

            let admin_options = base_options.clone().database("postgres");
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options.clone())
                .await?;

            let suffix: u64 = rand::thread_rng().r#gen();
            let database_name = format!("inbox_test_{suffix:016x}");
            sqlx::query(&format!("CREATE DATABASE \"{database_name}\""))
                .execute(&admin_pool)
                .await?;
            admin_pool.close().await;

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect_with(base_options.database(&database_name))
                .await?;
            MIGRATOR.run(&pool).await?;

            Ok(Self {
                pool,
                admin_options,
                database_name,
            })
        }

        pub fn pool(&self) -> &PgPool {
            &self.pool
        }

        pub fn pool_clone(&self) -> PgPool {
            self.pool.clone()
        }

        /// Close pool connections and drop the database.
        pub async fn close(self) -> Result<(), TestDatabaseError> {
            self.pool.close().await;

            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(self.admin_options)
                .await?;
            sqlx::query(&format!(
                "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
                self.database_name
            ))
            .execute(&admin_pool)
            .await?;
            Ok(())
        }
    }
}
