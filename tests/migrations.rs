use inbox_cache::migration::MIGRATOR;
use inbox_cache::test_support::{TestDatabase, TestDatabaseError};
use sqlx::PgPool;

async fn email_users_tables(pool: &PgPool) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'email_users'",
    )
    .fetch_one(pool)
    .await
    .expect("lookup succeeded")
}

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping migration revert test: TEST_DATABASE_URL not set");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = test_db.pool_clone();

    MIGRATOR.run(&pool).await.expect("migrations run");
    assert_eq!(email_users_tables(&pool).await, 1);

    MIGRATOR.undo(&pool, 0).await.expect("migrations revert");
    assert_eq!(
        email_users_tables(&pool).await,
        0,
        "email_users should be dropped after revert"
    );

    MIGRATOR.run(&pool).await.expect("migrations rerun");
    assert_eq!(email_users_tables(&pool).await, 1);

    test_db.close().await.expect("failed to drop test database");
}
