//! Backing store boundary
//!
//! The resolver reads through [`TrainerStore`]; the profile editor writes
//! patches through it. Two implementations:
//! - [`SqliteTrainerStore`]: sqlx/SQLite, the production store
//! - [`InMemoryTrainerStore`]: process-local, with call counters and
//!   failure injection for tests and demos

mod memory;
mod sqlite;

pub use memory::{InMemoryTrainerStore, StoreCalls};
pub use sqlite::SqliteTrainerStore;

use crate::merger::merge_profile;
use crate::types::{ProfilePatch, TrainerRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Store-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport or connection failure
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    /// The record changed shape under the save (vanished row, required value now empty)
    #[error("Save conflict: {0}")]
    SaveConflict(String),
}

/// Read and write access to trainer records
#[async_trait]
pub trait TrainerStore: Send + Sync {
    /// Exact slug lookup in the materialized slug view.
    ///
    /// A missing or empty view is `Ok(None)`, not an error.
    async fn find_in_slug_view(&self, slug: &str) -> Result<Option<TrainerRecord>, StoreError>;

    /// Direct keyed lookup by unique id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrainerRecord>, StoreError>;

    /// Trainers matching `slug` in the best non-empty [`LegacyMatchTier`]:
    /// current slug equal ignoring case, then a former slug, then a current
    /// slug starting with `slug` followed by a hyphen. Candidates in one tier
    /// are ordered by slug.
    ///
    /// `slug` is expected to be slug-shaped (no SQL wildcard characters).
    async fn find_by_legacy_slug(&self, slug: &str) -> Result<Vec<TrainerRecord>, StoreError>;

    /// Persist a partial patch against one trainer, all-or-nothing
    async fn apply_patch(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), StoreError>;
}

/// How a legacy slug lookup matched a trainer, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LegacyMatchTier {
    /// Current slug, ignoring case
    Exact,
    /// A slug the trainer held before a rename
    Renamed,
    /// Current slug extends the wanted one with a hyphenated suffix
    Prefix,
}

impl LegacyMatchTier {
    /// Tier for one trainer, or `None` if it does not match at all
    pub fn classify(current: &str, wanted: &str, held_before: bool) -> Option<Self> {
        let current = current.to_lowercase();
        let wanted = wanted.to_lowercase();
        if current == wanted {
            Some(Self::Exact)
        } else if held_before {
            Some(Self::Renamed)
        } else if current
            .strip_prefix(wanted.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
        {
            Some(Self::Prefix)
        } else {
            None
        }
    }
}

/// Keep only the candidates in the best tier present
pub fn best_tier<T>(candidates: Vec<(LegacyMatchTier, T)>) -> Vec<T> {
    let Some(best) = candidates.iter().map(|(tier, _)| *tier).min() else {
        return Vec::new();
    };
    candidates
        .into_iter()
        .filter(|(tier, _)| *tier == best)
        .map(|(_, candidate)| candidate)
        .collect()
}

/// Apply a patch to a canonical record.
///
/// Column-backed fields (`name`, `email`, `city`, `specialties`) are written
/// to columns, since a column value always wins the merge. Everything else
/// is written into the profile document, which is created if absent.
/// Returns true if the document changed.
pub fn apply_patch_to_record(
    record: &mut TrainerRecord,
    patch: &ProfilePatch,
    now: DateTime<Utc>,
) -> bool {
    if let Some(name) = &patch.name {
        record.name = Some(name.clone());
    }
    if let Some(email) = &patch.email {
        record.email = Some(email.clone());
    }
    if let Some(city) = &patch.city {
        record.city = Some(city.clone());
    }
    if let Some(specialties) = &patch.specialties {
        record.specialties = Some(specialties.iter().cloned().collect());
    }
    record.updated_at = now;

    let entries = document_entries(patch);
    if entries.is_empty() {
        return false;
    }

    // A non-object document carries nothing the merger would read
    let mut document = match record.profile.take() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    document.extend(entries);
    record.profile = Some(Value::Object(document));
    true
}

fn strings<'a>(values: impl IntoIterator<Item = &'a String>) -> Value {
    Value::Array(values.into_iter().cloned().map(Value::String).collect())
}

fn document_entries(patch: &ProfilePatch) -> Map<String, Value> {
    let mut entries = Map::new();
    if let Some(bio) = &patch.bio {
        entries.insert("bio".to_string(), Value::String(bio.clone()));
    }
    if let Some(phone) = &patch.phone {
        entries.insert("phone".to_string(), Value::String(phone.clone()));
    }
    if let Some(years) = patch.years_of_experience {
        entries.insert("years_of_experience".to_string(), Value::from(years));
    }
    if let Some(modalities) = &patch.modalities {
        entries.insert("modalities".to_string(), strings(modalities));
    }
    if let Some(cities) = &patch.cities {
        entries.insert("cities".to_string(), strings(cities));
    }
    if let Some(gallery) = &patch.gallery {
        entries.insert("gallery".to_string(), strings(gallery));
    }
    if let Some(stories) = &patch.stories {
        entries.insert("stories".to_string(), strings(stories));
    }
    if let Some(education) = &patch.education {
        entries.insert("education".to_string(), strings(education));
    }
    entries
}

/// Reject a patch that would take a trainer's rendered name away.
///
/// A trainer that never had a name can still be patched; only a patch that
/// sets a blank name, or one that empties a name that was there, conflicts.
pub fn ensure_saveable(
    before: &TrainerRecord,
    after: &TrainerRecord,
    patch: &ProfilePatch,
) -> Result<(), StoreError> {
    if !merge_profile(after).name.trim().is_empty() {
        return Ok(());
    }

    let had_name = !merge_profile(before).name.trim().is_empty();
    if patch.name.is_some() || had_name {
        return Err(StoreError::SaveConflict(format!(
            "trainer {} would be left without a name",
            after.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_match_tiers() {
        use LegacyMatchTier::*;
        assert_eq!(LegacyMatchTier::classify("ana-souza", "ana-souza", false), Some(Exact));
        assert_eq!(LegacyMatchTier::classify("Ana-Souza", "ana-souza", true), Some(Exact));
        assert_eq!(LegacyMatchTier::classify("ana-lima", "ana-souza", true), Some(Renamed));
        assert_eq!(
            LegacyMatchTier::classify("ana-souza-e0f255ab", "ana-souza", false),
            Some(Prefix)
        );
        assert_eq!(LegacyMatchTier::classify("ana-souzas", "ana-souza", false), None);
        assert_eq!(LegacyMatchTier::classify("ana", "ana-souza", false), None);
    }

    #[test]
    fn test_best_tier_keeps_only_the_first_non_empty_tier() {
        use LegacyMatchTier::*;
        let candidates = vec![(Prefix, "ana-souza-e0f255ab"), (Exact, "ana-souza"), (Prefix, "ana-souza-11aa22bb")];
        assert_eq!(best_tier(candidates), vec!["ana-souza"]);

        let candidates = vec![(Prefix, "a"), (Renamed, "b"), (Renamed, "c")];
        assert_eq!(best_tier(candidates), vec!["b", "c"]);

        assert!(best_tier::<&str>(Vec::new()).is_empty());
    }

    #[test]
    fn test_patch_routes_columns_and_document() {
        let mut record = TrainerRecord::new(Uuid::new_v4(), "ana-souza");
        record.profile = Some(json!({ "bio": "old", "instagram": "@ana" }));

        let patch = ProfilePatch {
            name: Some("Ana Souza".to_string()),
            bio: Some("new".to_string()),
            years_of_experience: Some(7),
            ..Default::default()
        };
        let touched = apply_patch_to_record(&mut record, &patch, fitmatch_common::time::now());

        assert!(touched);
        assert_eq!(record.name.as_deref(), Some("Ana Souza"));
        let document = record.profile.unwrap();
        assert_eq!(document["bio"], "new");
        assert_eq!(document["years_of_experience"], 7);
        // Unknown keys survive
        assert_eq!(document["instagram"], "@ana");
        assert!(document.get("name").is_none());
    }

    #[test]
    fn test_column_only_patch_leaves_document_alone() {
        let mut record = TrainerRecord::new(Uuid::new_v4(), "ana-souza");
        let patch = ProfilePatch {
            city: Some("Recife".to_string()),
            ..Default::default()
        };

        assert!(!apply_patch_to_record(&mut record, &patch, fitmatch_common::time::now()));
        assert_eq!(record.profile, None);
        assert_eq!(record.city.as_deref(), Some("Recife"));
    }

    #[test]
    fn test_patch_creates_document_when_malformed() {
        let mut record = TrainerRecord::new(Uuid::new_v4(), "ana-souza");
        record.profile = Some(json!("not an object"));
        let patch = ProfilePatch {
            phone: Some("+55 81 98888-0000".to_string()),
            ..Default::default()
        };

        apply_patch_to_record(&mut record, &patch, fitmatch_common::time::now());
        assert_eq!(record.profile, Some(json!({ "phone": "+55 81 98888-0000" })));
    }

    fn patched(before: &TrainerRecord, patch: &ProfilePatch) -> TrainerRecord {
        let mut after = before.clone();
        apply_patch_to_record(&mut after, patch, fitmatch_common::time::now());
        after
    }

    #[test]
    fn test_ensure_saveable_rejects_blanking_a_name() {
        let mut before = TrainerRecord::new(Uuid::new_v4(), "ana-souza");
        before.name = Some("Ana".to_string());

        let patch = ProfilePatch {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        let result = ensure_saveable(&before, &patched(&before, &patch), &patch);
        assert!(matches!(result, Err(StoreError::SaveConflict(_))));

        // A blank column wins the merge over a document name
        before.profile = Some(json!({ "name": "Ana" }));
        assert!(ensure_saveable(&before, &patched(&before, &patch), &patch).is_err());

        let rename = ProfilePatch {
            name: Some("Ana Souza".to_string()),
            ..Default::default()
        };
        assert!(ensure_saveable(&before, &patched(&before, &rename), &rename).is_ok());
    }

    #[test]
    fn test_ensure_saveable_allows_patching_a_nameless_trainer() {
        let before = TrainerRecord::new(Uuid::new_v4(), "novo-trainer");
        let patch = ProfilePatch {
            bio: Some("Personal trainer".to_string()),
            ..Default::default()
        };
        assert!(ensure_saveable(&before, &patched(&before, &patch), &patch).is_ok());

        // Explicitly setting a blank name is still a conflict
        let patch = ProfilePatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(ensure_saveable(&before, &patched(&before, &patch), &patch).is_err());
    }
}
