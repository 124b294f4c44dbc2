//! In-memory trainer store
//!
//! Mirrors the SQLite store's semantics without a database. Counts every
//! trait call and can be told to fail reads or the next save, which is how
//! resolver and editor tests observe store traffic.

use super::{
    apply_patch_to_record, best_tier, ensure_saveable, LegacyMatchTier, StoreError, TrainerStore,
};
use crate::types::{ProfilePatch, TrainerRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Number of calls made to each trait method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub slug_view: usize,
    pub by_id: usize,
    pub legacy_slug: usize,
    pub apply_patch: usize,
}

#[derive(Debug, Default)]
struct CallCounters {
    slug_view: AtomicUsize,
    by_id: AtomicUsize,
    legacy_slug: AtomicUsize,
    apply_patch: AtomicUsize,
}

/// Process-local [`TrainerStore`]
#[derive(Debug)]
pub struct InMemoryTrainerStore {
    trainers: RwLock<BTreeMap<Uuid, TrainerRecord>>,
    /// (trainer id, retired slug)
    slug_history: RwLock<Vec<(Uuid, String)>>,
    view_available: AtomicBool,
    read_failure: RwLock<Option<String>>,
    save_failure: RwLock<Option<StoreError>>,
    calls: CallCounters,
}

impl InMemoryTrainerStore {
    pub fn new() -> Self {
        Self {
            trainers: RwLock::new(BTreeMap::new()),
            slug_history: RwLock::new(Vec::new()),
            view_available: AtomicBool::new(true),
            read_failure: RwLock::new(None),
            save_failure: RwLock::new(None),
            calls: CallCounters::default(),
        }
    }

    /// Insert or replace a trainer
    pub async fn insert(&self, record: TrainerRecord) {
        self.trainers.write().await.insert(record.id, record);
    }

    /// Current copy of a trainer
    pub async fn get(&self, id: Uuid) -> Option<TrainerRecord> {
        self.trainers.read().await.get(&id).cloned()
    }

    /// Change a trainer's slug, keeping the old one in the slug history
    pub async fn rename_slug(&self, id: Uuid, new_slug: &str) -> Result<(), StoreError> {
        let mut trainers = self.trainers.write().await;
        let record = trainers
            .get_mut(&id)
            .ok_or_else(|| StoreError::SaveConflict(format!("trainer {} does not exist", id)))?;

        let old_slug = std::mem::replace(&mut record.slug, new_slug.to_string());
        record.updated_at = fitmatch_common::time::now();
        self.slug_history.write().await.push((id, old_slug));
        Ok(())
    }

    /// Simulate the slug view being absent (not yet materialized)
    pub fn set_view_available(&self, available: bool) {
        self.view_available.store(available, Ordering::SeqCst);
    }

    /// Make every read fail with `Unavailable(message)` until cleared
    pub async fn fail_reads(&self, message: Option<&str>) {
        *self.read_failure.write().await = message.map(str::to_string);
    }

    /// Make the next `apply_patch` fail with `error`
    pub async fn fail_next_save(&self, error: StoreError) {
        *self.save_failure.write().await = Some(error);
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            slug_view: self.calls.slug_view.load(Ordering::SeqCst),
            by_id: self.calls.by_id.load(Ordering::SeqCst),
            legacy_slug: self.calls.legacy_slug.load(Ordering::SeqCst),
            apply_patch: self.calls.apply_patch.load(Ordering::SeqCst),
        }
    }

    async fn check_reads(&self) -> Result<(), StoreError> {
        match self.read_failure.read().await.as_ref() {
            Some(message) => Err(StoreError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryTrainerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrainerStore for InMemoryTrainerStore {
    async fn find_in_slug_view(&self, slug: &str) -> Result<Option<TrainerRecord>, StoreError> {
        self.calls.slug_view.fetch_add(1, Ordering::SeqCst);
        self.check_reads().await?;

        if !self.view_available.load(Ordering::SeqCst) {
            debug!("slug view not materialized; treating as miss");
            return Ok(None);
        }

        Ok(self
            .trainers
            .read()
            .await
            .values()
            .find(|record| record.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrainerRecord>, StoreError> {
        self.calls.by_id.fetch_add(1, Ordering::SeqCst);
        self.check_reads().await?;

        Ok(self.trainers.read().await.get(&id).cloned())
    }

    async fn find_by_legacy_slug(&self, slug: &str) -> Result<Vec<TrainerRecord>, StoreError> {
        self.calls.legacy_slug.fetch_add(1, Ordering::SeqCst);
        self.check_reads().await?;

        // Same lock order as rename_slug: trainers, then history
        let trainers = self.trainers.read().await;
        let history = self.slug_history.read().await;

        let mut candidates: Vec<(LegacyMatchTier, &TrainerRecord)> = trainers
            .values()
            .filter_map(|record| {
                let held_before = history
                    .iter()
                    .any(|(id, old)| *id == record.id && old.eq_ignore_ascii_case(slug));
                LegacyMatchTier::classify(&record.slug, slug, held_before).map(|tier| (tier, record))
            })
            .collect();
        candidates.sort_by(|a, b| a.1.slug.cmp(&b.1.slug));

        Ok(best_tier(candidates).into_iter().cloned().collect())
    }

    async fn apply_patch(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), StoreError> {
        self.calls.apply_patch.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.save_failure.write().await.take() {
            return Err(error);
        }

        let mut trainers = self.trainers.write().await;
        let current = trainers
            .get(&id)
            .ok_or_else(|| StoreError::SaveConflict(format!("trainer {} no longer exists", id)))?;

        let mut updated = current.clone();
        apply_patch_to_record(&mut updated, patch, fitmatch_common::time::now());
        ensure_saveable(current, &updated, patch)?;

        trainers.insert(id, updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trainer(slug: &str) -> TrainerRecord {
        let mut record = TrainerRecord::new(Uuid::new_v4(), slug);
        record.name = Some("Trainer".to_string());
        record
    }

    #[tokio::test]
    async fn test_slug_view_exact_match_only() {
        let store = InMemoryTrainerStore::new();
        store.insert(trainer("ana-souza-e0f255ab")).await;

        assert!(store.find_in_slug_view("ana-souza-e0f255ab").await.unwrap().is_some());
        assert!(store.find_in_slug_view("ana-souza").await.unwrap().is_none());
        assert_eq!(store.calls().slug_view, 2);
    }

    #[tokio::test]
    async fn test_missing_view_is_a_miss() {
        let store = InMemoryTrainerStore::new();
        store.insert(trainer("ana-souza")).await;
        store.set_view_available(false);

        assert_eq!(store.find_in_slug_view("ana-souza").await, Ok(None));
    }

    #[tokio::test]
    async fn test_legacy_matches_history() {
        let store = InMemoryTrainerStore::new();
        let record = trainer("ana-souza");
        let id = record.id;
        store.insert(record).await;
        store.rename_slug(id, "ana-souza-lima").await.unwrap();

        let found = store.find_by_legacy_slug("ana-souza").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "ana-souza-lima");
    }

    #[tokio::test]
    async fn test_legacy_exact_slug_beats_prefix_matches() {
        let store = InMemoryTrainerStore::new();
        store.insert(trainer("ana-souza-e0f255ab")).await;
        store.insert(trainer("Ana-Souza")).await;
        store.insert(trainer("ana-souza-11aa22bb")).await;

        let found = store.find_by_legacy_slug("ana-souza").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "Ana-Souza");
    }

    #[tokio::test]
    async fn test_legacy_former_slug_beats_prefix_matches() {
        let store = InMemoryTrainerStore::new();
        let renamed = trainer("ana-souza");
        let id = renamed.id;
        store.insert(renamed).await;
        store.rename_slug(id, "ana-lima").await.unwrap();
        store.insert(trainer("ana-souza-e0f255ab")).await;

        let found = store.find_by_legacy_slug("ana-souza").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[tokio::test]
    async fn test_read_failure_injection() {
        let store = InMemoryTrainerStore::new();
        store.fail_reads(Some("connection reset")).await;

        assert_eq!(
            store.find_by_id(Uuid::new_v4()).await,
            Err(StoreError::Unavailable("connection reset".to_string()))
        );

        store.fail_reads(None).await;
        assert_eq!(store.find_by_id(Uuid::new_v4()).await, Ok(None));
    }

    #[tokio::test]
    async fn test_save_failure_is_one_shot() {
        let store = InMemoryTrainerStore::new();
        let record = trainer("ana-souza");
        let id = record.id;
        store.insert(record).await;
        store
            .fail_next_save(StoreError::Unavailable("timeout".to_string()))
            .await;

        let patch = ProfilePatch {
            bio: Some("bio".to_string()),
            ..Default::default()
        };
        assert!(store.apply_patch(id, &patch).await.is_err());
        assert!(store.apply_patch(id, &patch).await.is_ok());

        let saved = store.get(id).await.unwrap();
        assert_eq!(saved.profile, Some(json!({ "bio": "bio" })));
    }

    #[tokio::test]
    async fn test_patch_blanking_name_is_conflict_and_not_applied() {
        let store = InMemoryTrainerStore::new();
        let record = trainer("ana-souza");
        let id = record.id;
        store.insert(record).await;

        let patch = ProfilePatch {
            name: Some(String::new()),
            bio: Some("bio".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.apply_patch(id, &patch).await,
            Err(StoreError::SaveConflict(_))
        ));

        let unchanged = store.get(id).await.unwrap();
        assert_eq!(unchanged.name.as_deref(), Some("Trainer"));
        assert_eq!(unchanged.profile, None);
    }

    #[tokio::test]
    async fn test_patch_on_nameless_trainer_is_saved() {
        let store = InMemoryTrainerStore::new();
        let record = TrainerRecord::new(Uuid::new_v4(), "novo-trainer");
        let id = record.id;
        store.insert(record).await;

        let patch = ProfilePatch {
            bio: Some("Personal trainer".to_string()),
            ..Default::default()
        };
        store.apply_patch(id, &patch).await.unwrap();

        let saved = store.get(id).await.unwrap();
        assert_eq!(saved.profile, Some(json!({ "bio": "Personal trainer" })));
    }

    #[tokio::test]
    async fn test_patch_for_missing_trainer_is_conflict() {
        let store = InMemoryTrainerStore::new();
        let result = store
            .apply_patch(Uuid::new_v4(), &ProfilePatch::default())
            .await;
        assert!(matches!(result, Err(StoreError::SaveConflict(_))));
    }
}
