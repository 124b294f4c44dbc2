//! SQLite trainer store
//!
//! Reads go through the `trainer_profiles_by_slug` view (strategy 1) or the
//! `trainers` table joined with `trainer_profiles`. Writes run in a single
//! transaction so a patch is all-or-nothing.

use super::{
    apply_patch_to_record, best_tier, ensure_saveable, LegacyMatchTier, StoreError, TrainerStore,
};
use crate::types::{ProfilePatch, TrainerRecord, UserRole};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fitmatch_common::db::SLUG_VIEW;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, slug, name, email, city, specialties, role, \
                              is_active, is_verified, created_at, updated_at, document";

const TRAINER_SELECT: &str = r#"
    SELECT t.id, t.slug, t.name, t.email, t.city, t.specialties, t.role,
           t.is_active, t.is_verified, t.created_at, t.updated_at, p.document
    FROM trainers t
    LEFT JOIN trainer_profiles p ON p.trainer_id = t.id
"#;

/// sqlx-backed [`TrainerStore`]
#[derive(Debug, Clone)]
pub struct SqliteTrainerStore {
    pool: SqlitePool,
}

impl SqliteTrainerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a trainer and, if present, its profile document
    pub async fn insert_trainer(&self, record: &TrainerRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query(
            r#"
            INSERT INTO trainers (
                id, slug, name, email, city, specialties, role,
                is_active, is_verified, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.slug)
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.city)
        .bind(encode_specialties(&record.specialties)?)
        .bind(record.role.as_str())
        .bind(record.is_active)
        .bind(record.is_verified)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        if let Some(document) = &record.profile {
            upsert_document(&mut tx, record.id, document, record.updated_at).await?;
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    /// Change a trainer's slug, keeping the old one in the slug history
    pub async fn rename_slug(&self, id: Uuid, new_slug: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let old_slug: Option<String> = sqlx::query_scalar("SELECT slug FROM trainers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(unavailable)?;
        let old_slug = old_slug
            .ok_or_else(|| StoreError::SaveConflict(format!("trainer {} does not exist", id)))?;

        let now = fitmatch_common::time::now();
        sqlx::query(
            r#"
            INSERT INTO trainer_slug_history (trainer_id, slug, retired_at)
            VALUES (?, ?, ?)
            ON CONFLICT(trainer_id, slug) DO UPDATE SET retired_at = excluded.retired_at
            "#,
        )
        .bind(id.to_string())
        .bind(&old_slug)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        sqlx::query("UPDATE trainers SET slug = ?, updated_at = ? WHERE id = ?")
            .bind(new_slug)
            .bind(now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(write_error)?;

        tx.commit().await.map_err(unavailable)?;
        debug!(trainer_id = %id, old_slug = %old_slug, new_slug = %new_slug, "Trainer slug renamed");
        Ok(())
    }
}

#[async_trait]
impl TrainerStore for SqliteTrainerStore {
    async fn find_in_slug_view(&self, slug: &str) -> Result<Option<TrainerRecord>, StoreError> {
        let sql = format!("SELECT {} FROM {} WHERE slug = ?", RECORD_COLUMNS, SLUG_VIEW);
        let row = sqlx::query(&sql).bind(slug).fetch_optional(&self.pool).await;

        match row {
            Ok(row) => Ok(row.as_ref().and_then(record_from_row)),
            Err(e) if is_missing_relation(&e) => {
                debug!(error = %e, "Slug view not materialized; treating as miss");
                Ok(None)
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrainerRecord>, StoreError> {
        let sql = format!("{} WHERE t.id = ?", TRAINER_SELECT);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(row.as_ref().and_then(record_from_row))
    }

    async fn find_by_legacy_slug(&self, slug: &str) -> Result<Vec<TrainerRecord>, StoreError> {
        let sql = r#"
            WITH renamed AS (
                SELECT trainer_id FROM trainer_slug_history WHERE lower(slug) = lower(?)
            )
            SELECT t.id, t.slug, t.name, t.email, t.city, t.specialties, t.role,
                   t.is_active, t.is_verified, t.created_at, t.updated_at, p.document,
                   CASE
                       WHEN lower(t.slug) = lower(?) THEN 0
                       WHEN t.id IN (SELECT trainer_id FROM renamed) THEN 1
                       ELSE 2
                   END AS match_tier
            FROM trainers t
            LEFT JOIN trainer_profiles p ON p.trainer_id = t.id
            WHERE lower(t.slug) = lower(?)
               OR lower(t.slug) LIKE lower(?) || '-%'
               OR t.id IN (SELECT trainer_id FROM renamed)
            ORDER BY match_tier, t.slug
        "#;
        let rows = sqlx::query(sql)
            .bind(slug)
            .bind(slug)
            .bind(slug)
            .bind(slug)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let candidates: Vec<(LegacyMatchTier, TrainerRecord)> = rows
            .iter()
            .filter_map(|row| {
                let tier = match row.try_get::<i64, _>("match_tier").ok()? {
                    0 => LegacyMatchTier::Exact,
                    1 => LegacyMatchTier::Renamed,
                    _ => LegacyMatchTier::Prefix,
                };
                record_from_row(row).map(|record| (tier, record))
            })
            .collect();

        Ok(best_tier(candidates))
    }

    async fn apply_patch(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let sql = format!("{} WHERE t.id = ?", TRAINER_SELECT);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(unavailable)?;
        let current = row
            .as_ref()
            .and_then(record_from_row)
            .ok_or_else(|| StoreError::SaveConflict(format!("trainer {} no longer exists", id)))?;

        let mut record = current.clone();
        let document_changed = apply_patch_to_record(&mut record, patch, fitmatch_common::time::now());
        ensure_saveable(&current, &record, patch)?;

        sqlx::query(
            r#"
            UPDATE trainers
            SET name = ?, email = ?, city = ?, specialties = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.city)
        .bind(encode_specialties(&record.specialties)?)
        .bind(record.updated_at)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        if document_changed {
            if let Some(document) = &record.profile {
                upsert_document(&mut tx, id, document, record.updated_at).await?;
            }
        }

        // Dropping the transaction on any early return above rolls it back
        tx.commit().await.map_err(unavailable)?;

        debug!(trainer_id = %id, fields = ?patch.field_names(), "Profile patch committed");
        Ok(())
    }
}

async fn upsert_document(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
    document: &Value,
    updated_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(document)
        .map_err(|e| StoreError::SaveConflict(format!("profile document not encodable: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO trainer_profiles (trainer_id, document, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(trainer_id) DO UPDATE SET
            document = excluded.document,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id.to_string())
    .bind(encoded)
    .bind(updated_at)
    .execute(&mut **tx)
    .await
    .map_err(write_error)?;

    Ok(())
}

fn encode_specialties(specialties: &Option<Vec<String>>) -> Result<Option<String>, StoreError> {
    specialties
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::SaveConflict(format!("specialties not encodable: {}", e)))
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Constraint violations mean the row no longer fits the write
fn write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            StoreError::SaveConflict(db.message().to_string())
        }
        _ => unavailable(e),
    }
}

fn is_missing_relation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("no such table"))
}

/// Decode one row; rows with an unparseable id are skipped.
///
/// Malformed optional columns are read as NULL, and a document that is not
/// valid JSON is kept as `Value::Null` so the merger treats it as empty.
fn record_from_row(row: &SqliteRow) -> Option<TrainerRecord> {
    let raw_id: String = row.try_get("id").ok()?;
    let id = match Uuid::parse_str(&raw_id) {
        Ok(id) => id,
        Err(e) => {
            warn!(id = %raw_id, error = %e, "Skipping trainer row with malformed id");
            return None;
        }
    };

    let role = match row.try_get::<String, _>("role") {
        Ok(raw) => raw.parse::<UserRole>().unwrap_or_else(|e| {
            warn!(trainer_id = %id, error = %e, "Unknown role; defaulting to trainer");
            UserRole::Trainer
        }),
        Err(_) => UserRole::Trainer,
    };

    let specialties = optional_text(row, "specialties").and_then(|raw| {
        serde_json::from_str::<Vec<String>>(&raw)
            .map_err(|e| warn!(trainer_id = %id, error = %e, "Malformed specialties column"))
            .ok()
    });

    let profile = optional_text(row, "document").map(|raw| {
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            warn!(trainer_id = %id, error = %e, "Malformed profile document");
            Value::Null
        })
    });

    Some(TrainerRecord {
        id,
        slug: row.try_get("slug").unwrap_or_default(),
        name: optional_text(row, "name"),
        email: optional_text(row, "email"),
        city: optional_text(row, "city"),
        specialties,
        role,
        is_active: row.try_get::<Option<bool>, _>("is_active").ok().flatten(),
        is_verified: row.try_get::<Option<bool>, _>("is_verified").ok().flatten(),
        created_at: row.try_get("created_at").unwrap_or_default(),
        updated_at: row.try_get("updated_at").unwrap_or_default(),
        profile,
    })
}

fn optional_text(row: &SqliteRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column).ok().flatten()
}
