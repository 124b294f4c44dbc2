//! Integration tests for database initialization
//!
//! Covers automatic database creation, reopening an existing file, and
//! idempotent schema creation.

use fitmatch_common::db::{init_database, init_memory_database, init_schema, SLUG_VIEW};
use sqlx::SqlitePool;

async fn object_names(pool: &SqlitePool, kind: &str) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = ? ORDER BY name")
        .bind(kind)
        .fetch_all(pool)
        .await
        .expect("Should query sqlite_master")
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("fitmatch.db");

    let pool = init_database(&db_path).await;

    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("fitmatch.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());
    drop(pool1);

    // Open database second time (should succeed)
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_schema_tables_and_view_exist() {
    let pool = init_memory_database().await.unwrap();

    let tables = object_names(&pool, "table").await;
    for expected in ["trainer_profiles", "trainer_slug_history", "trainers"] {
        assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
    }

    let views = object_names(&pool, "view").await;
    assert_eq!(views, vec![SLUG_VIEW.to_string()]);
}

#[tokio::test]
async fn test_schema_init_is_idempotent() {
    let pool = init_memory_database().await.unwrap();

    init_schema(&pool).await.expect("second init should succeed");
    init_schema(&pool).await.expect("third init should succeed");

    let views = object_names(&pool, "view").await;
    assert_eq!(views.len(), 1);
}
