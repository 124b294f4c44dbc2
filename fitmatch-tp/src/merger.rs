//! Profile Integration Merger
//!
//! Combines a canonical [`TrainerRecord`] with its loosely-structured
//! profile document into one [`UnifiedTrainerProfile`].
//!
//! # Precedence (per field, highest first)
//! 1. Column value present on the record
//! 2. Value in the profile document
//! 3. Default: `""`, empty set/list, `false`, `0`
//!
//! List fields are never unioned: a column-level list replaces the
//! document list wholesale.
//!
//! # Coercion
//! The raw document is coerced exactly once, here. A key with the wrong
//! JSON type counts as absent, non-string list entries are dropped, and a
//! document that is not a JSON object is treated as empty. Merging never
//! fails.

use crate::types::{TrainerRecord, UnifiedTrainerProfile};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Typed view of the profile document after coercion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDocument {
    // Copies of column data; may be stale
    pub name: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub specialties: Option<BTreeSet<String>>,

    pub bio: Option<String>,
    pub phone: Option<String>,
    pub years_of_experience: Option<u32>,
    pub modalities: Option<BTreeSet<String>>,
    pub cities: Option<BTreeSet<String>>,
    pub gallery: Option<Vec<String>>,
    pub stories: Option<Vec<String>>,
    pub education: Option<Vec<String>>,
}

impl ProfileDocument {
    /// Coerce a raw JSON document into the typed schema
    pub fn coerce(raw: &Value) -> Self {
        let Some(doc) = raw.as_object() else {
            return Self::default();
        };

        Self {
            name: text(doc, "name"),
            email: text(doc, "email"),
            city: text(doc, "city"),
            is_active: flag(doc, "is_active"),
            is_verified: flag(doc, "is_verified"),
            specialties: list(doc, "specialties").map(|v| v.into_iter().collect()),
            bio: text(doc, "bio"),
            phone: text(doc, "phone"),
            years_of_experience: doc
                .get("years_of_experience")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            modalities: list(doc, "modalities").map(|v| v.into_iter().collect()),
            cities: list(doc, "cities").map(|v| v.into_iter().collect()),
            gallery: list(doc, "gallery"),
            stories: list(doc, "stories"),
            education: list(doc, "education"),
        }
    }
}

fn text(doc: &Map<String, Value>, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_string)
}

fn flag(doc: &Map<String, Value>, key: &str) -> Option<bool> {
    doc.get(key).and_then(Value::as_bool)
}

fn list(doc: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    doc.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Merge a canonical record and its profile document.
///
/// Pure: identical input always yields an identical profile.
pub fn merge_profile(record: &TrainerRecord) -> UnifiedTrainerProfile {
    let doc = record
        .profile
        .as_ref()
        .map(ProfileDocument::coerce)
        .unwrap_or_default();

    let specialties = match &record.specialties {
        Some(column) => column.iter().cloned().collect(),
        None => doc.specialties.unwrap_or_default(),
    };

    UnifiedTrainerProfile {
        id: record.id,
        slug: record.slug.clone(),
        name: record.name.clone().or(doc.name).unwrap_or_default(),
        email: record.email.clone().or(doc.email).unwrap_or_default(),
        city: record.city.clone().or(doc.city).unwrap_or_default(),
        role: record.role,
        is_active: record.is_active.or(doc.is_active).unwrap_or(false),
        is_verified: record.is_verified.or(doc.is_verified).unwrap_or(false),
        created_at: record.created_at,
        updated_at: record.updated_at,
        has_profile_document: record.profile.is_some(),
        bio: doc.bio.unwrap_or_default(),
        phone: doc.phone.unwrap_or_default(),
        years_of_experience: doc.years_of_experience.unwrap_or(0),
        modalities: doc.modalities.unwrap_or_default(),
        cities: doc.cities.unwrap_or_default(),
        specialties,
        gallery: doc.gallery.unwrap_or_default(),
        stories: doc.stories.unwrap_or_default(),
        education: doc.education.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn record_with(profile: Option<Value>) -> TrainerRecord {
        let mut record = TrainerRecord::new(Uuid::new_v4(), "ana-souza-e0f255ab");
        record.profile = profile;
        record
    }

    #[test]
    fn test_document_value_used_without_column() {
        let record = record_with(Some(json!({ "bio": "Treinadora funcional há 8 anos" })));
        let profile = merge_profile(&record);
        assert_eq!(profile.bio, "Treinadora funcional há 8 anos");
        assert!(profile.has_profile_document);
    }

    #[test]
    fn test_column_beats_document_for_every_overlapping_field() {
        let mut record = record_with(Some(json!({
            "name": "Ana (old)",
            "email": "old@example.com",
            "city": "Olinda",
            "is_active": false,
            "is_verified": false,
            "specialties": ["pilates", "yoga"],
        })));
        record.name = Some("Ana Souza".to_string());
        record.email = Some("ana@example.com".to_string());
        record.city = Some("Recife".to_string());
        record.is_active = Some(true);
        record.is_verified = Some(true);
        record.specialties = Some(vec!["crossfit".to_string()]);

        let profile = merge_profile(&record);
        assert_eq!(profile.name, "Ana Souza");
        assert_eq!(profile.email, "ana@example.com");
        assert_eq!(profile.city, "Recife");
        assert!(profile.is_active);
        assert!(profile.is_verified);
        assert_eq!(
            profile.specialties,
            ["crossfit".to_string()].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_column_false_still_wins() {
        let mut record = record_with(Some(json!({ "is_verified": true })));
        record.is_verified = Some(false);
        assert!(!merge_profile(&record).is_verified);
    }

    #[test]
    fn test_empty_column_list_replaces_document_list() {
        let mut record = record_with(Some(json!({ "specialties": ["pilates"] })));
        record.specialties = Some(vec![]);
        assert!(merge_profile(&record).specialties.is_empty());
    }

    #[test]
    fn test_defaults_without_document() {
        let profile = merge_profile(&record_with(None));
        assert_eq!(profile.name, "");
        assert_eq!(profile.bio, "");
        assert_eq!(profile.years_of_experience, 0);
        assert!(!profile.is_active);
        assert!(profile.modalities.is_empty());
        assert!(profile.gallery.is_empty());
        assert!(!profile.has_profile_document);
    }

    #[test]
    fn test_malformed_fields_coerced_to_defaults() {
        let record = record_with(Some(json!({
            "bio": 42,
            "phone": ["+55"],
            "years_of_experience": "five",
            "is_verified": "yes",
            "modalities": "presencial",
            "cities": ["Recife", 3, null, "Olinda"],
            "gallery": { "0": "a.jpg" },
            "education": ["CREF 012345-G/PE"],
        })));

        let profile = merge_profile(&record);
        assert_eq!(profile.bio, "");
        assert_eq!(profile.phone, "");
        assert_eq!(profile.years_of_experience, 0);
        assert!(!profile.is_verified);
        assert!(profile.modalities.is_empty());
        assert_eq!(profile.cities.len(), 2);
        assert!(profile.gallery.is_empty());
        // Well-formed fields next to malformed ones still render
        assert_eq!(profile.education, vec!["CREF 012345-G/PE".to_string()]);
    }

    #[test]
    fn test_non_object_document_is_empty() {
        let profile = merge_profile(&record_with(Some(json!([1, 2, 3]))));
        assert_eq!(profile.bio, "");
        assert!(profile.has_profile_document);
    }

    #[test]
    fn test_negative_or_huge_years_coerced() {
        let profile = merge_profile(&record_with(Some(json!({ "years_of_experience": -3 }))));
        assert_eq!(profile.years_of_experience, 0);

        let profile = merge_profile(&record_with(Some(json!({ "years_of_experience": 1u64 << 40 }))));
        assert_eq!(profile.years_of_experience, 0);
    }

    #[test]
    fn test_duplicate_set_entries_collapse() {
        let profile = merge_profile(&record_with(Some(json!({
            "modalities": ["online", "presencial", "online"]
        }))));
        assert_eq!(profile.modalities.len(), 2);
    }

    #[test]
    fn test_merge_is_pure() {
        let mut record = record_with(Some(json!({
            "bio": "bio",
            "gallery": ["b.jpg", "a.jpg"],
            "specialties": ["yoga"],
        })));
        record.name = Some("Ana".to_string());

        let first = merge_profile(&record);
        let second = merge_profile(&record);
        assert_eq!(first, second);
        // Ordered lists keep document order
        assert_eq!(first.gallery, vec!["b.jpg".to_string(), "a.jpg".to_string()]);
    }
}
