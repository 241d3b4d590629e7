//! Schema migrations for the user store.
//!
//! Applied before any user lookup so the `email_users` table is always on the
//! latest schema.

use sqlx::{PgPool, migrate::Migrator};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations.
///
/// Idempotent: migrations that have already been applied are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("checking database migration state");

    MIGRATOR.run(pool).await?;

    log::info!("database migrations up to date");
    Ok(())
}
