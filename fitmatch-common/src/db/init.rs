//! Database initialization
//!
//! Creates the database file on first run and idempotently creates the
//! trainer tables and the slug view used for identifier resolution.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Name of the materialized slug view (trainers joined with their profile document)
pub const SLUG_VIEW: &str = "trainer_profiles_by_slug";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema.
///
/// Every connection to `sqlite::memory:` opens a separate database, so the
/// pool is capped at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and views (idempotent - safe to call multiple times)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_trainers_table(pool).await?;
    create_trainer_profiles_table(pool).await?;
    create_slug_history_table(pool).await?;
    create_slug_view(pool).await?;

    Ok(())
}

/// Canonical, strictly-typed trainer columns
///
/// Nullable columns mean "no column-level value"; the profile document
/// supplies the value in that case.
async fn create_trainers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trainers (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT,
            email TEXT,
            city TEXT,
            specialties TEXT,
            role TEXT NOT NULL DEFAULT 'trainer',
            is_active INTEGER,
            is_verified INTEGER,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Loosely-structured profile document (JSON text), at most one per trainer
async fn create_trainer_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trainer_profiles (
            trainer_id TEXT PRIMARY KEY REFERENCES trainers(id) ON DELETE CASCADE,
            document TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Retired slugs, kept so renamed trainers stay reachable by old links
async fn create_slug_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trainer_slug_history (
            trainer_id TEXT NOT NULL REFERENCES trainers(id) ON DELETE CASCADE,
            slug TEXT NOT NULL,
            retired_at TIMESTAMP NOT NULL,
            PRIMARY KEY (trainer_id, slug)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_trainer_slug_history_slug ON trainer_slug_history(slug)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_slug_view(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS trainer_profiles_by_slug AS
        SELECT t.id, t.slug, t.name, t.email, t.city, t.specialties, t.role,
               t.is_active, t.is_verified, t.created_at, t.updated_at,
               p.document
        FROM trainers t
        LEFT JOIN trainer_profiles p ON p.trainer_id = t.id
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
