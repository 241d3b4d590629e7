use inbox_cache::test_support::{TestDatabase, TestDatabaseError};
use inbox_cache::{EmailUser, PgUserStore, UserStore};

#[tokio::test]
async fn user_records_round_trip_through_postgres() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping user store test: TEST_DATABASE_URL not set");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let store = PgUserStore::new(test_db.pool_clone());

    assert!(
        store
            .get("a@b.com")
            .await
            .expect("lookup succeeded")
            .is_none()
    );

    let created = store
        .create(&EmailUser::unprotected("a@b.com"))
        .await
        .expect("create succeeded");
    assert!(!created.password_protected);

    let mut protected = created.clone();
    protected.password_protected = true;
    protected.password_hash = "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".into();
    store.save(&protected).await.expect("save succeeded");

    // A second create for the same address must not reset the password.
    let again = store
        .create(&EmailUser::unprotected("a@b.com"))
        .await
        .expect("create succeeded");
    assert_eq!(again, protected);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_users")
        .fetch_one(test_db.pool())
        .await
        .expect("count succeeded");
    assert_eq!(rows, 1);

    test_db.close().await.expect("failed to drop test database");
}
