//! Core types for trainer identity resolution and profile editing
//!
//! Flow: raw identifier -> [`Identifier`] -> [`TrainerRecord`] (canonical
//! columns + raw profile document) -> [`UnifiedTrainerProfile`] (merged view)
//! -> edited through [`ProfilePatch`] values.

use chrono::{DateTime, Utc};
use fitmatch_common::uuid_utils;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Longest accepted slug, in bytes
pub const MAX_SLUG_LEN: usize = 128;

// ============================================================================
// Identifiers
// ============================================================================

/// Which of the two accepted identifier shapes an input has
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierShape {
    /// Hyphenated `8-4-4-4-12` hexadecimal unique id
    UniqueId,
    /// Lowercase, hyphen-delimited human-readable slug
    Slug,
}

impl IdentifierShape {
    pub const ALL: [IdentifierShape; 2] = [IdentifierShape::UniqueId, IdentifierShape::Slug];

    pub(crate) fn index(self) -> usize {
        match self {
            IdentifierShape::UniqueId => 0,
            IdentifierShape::Slug => 1,
        }
    }
}

/// A validated public-facing trainer identifier
///
/// Immutable once parsed. A string that is both UUID-shaped and
/// slug-shaped (lowercase hex) is always classified as a unique id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    raw: String,
    shape: IdentifierShape,
}

impl Identifier {
    /// Validate and classify a raw identifier
    ///
    /// # Errors
    /// [`ResolutionError::InvalidFormat`] if the input matches neither shape.
    pub fn parse(raw: &str) -> Result<Self, ResolutionError> {
        let shape = if uuid_utils::is_hyphenated(raw) {
            IdentifierShape::UniqueId
        } else if is_slug(raw) {
            IdentifierShape::Slug
        } else {
            return Err(ResolutionError::InvalidFormat(raw.to_string()));
        };

        Ok(Self {
            raw: raw.to_string(),
            shape,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn shape(&self) -> IdentifierShape {
        self.shape
    }

    /// The parsed unique id, if this identifier is UUID-shaped
    pub fn unique_id(&self) -> Option<Uuid> {
        match self.shape {
            IdentifierShape::UniqueId => uuid_utils::parse(&self.raw).ok(),
            IdentifierShape::Slug => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Lowercase ASCII alphanumeric segments joined by single hyphens
pub fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SLUG_LEN
        && s.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolution strategies, in the order the resolver tries them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    /// Exact slug lookup in the materialized slug view
    SlugView,
    /// Direct lookup by unique id (UUID-shaped identifiers only)
    UniqueId,
    /// Case-insensitive, prefix and historical slug match
    LegacySlug,
}

impl StrategyName {
    pub const ALL: [StrategyName; 3] = [
        StrategyName::SlugView,
        StrategyName::UniqueId,
        StrategyName::LegacySlug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyName::SlugView => "slug_view",
            StrategyName::UniqueId => "unique_id",
            StrategyName::LegacySlug => "legacy_slug",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            StrategyName::SlugView => 0,
            StrategyName::UniqueId => 1,
            StrategyName::LegacySlug => 2,
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one strategy attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Hit,
    Miss,
    Error,
}

impl AttemptOutcome {
    pub(crate) fn index(self) -> usize {
        match self {
            AttemptOutcome::Hit => 0,
            AttemptOutcome::Miss => 1,
            AttemptOutcome::Error => 2,
        }
    }
}

/// One strategy tried for one identifier; lives only until telemetry records it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionAttempt {
    pub strategy: StrategyName,
    pub shape: IdentifierShape,
    pub outcome: AttemptOutcome,
    pub latency: Duration,
}

/// Terminal resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Identifier matches neither accepted shape; no store access was made
    #[error("Invalid trainer identifier: {0}")]
    InvalidFormat(String),

    /// Every strategy missed
    #[error("Trainer profile not found: {0}")]
    NotFound(String),

    /// Legacy slug match found several trainers; never resolved by guessing
    #[error("Trainer identifier '{identifier}' is ambiguous ({} candidates: {})", .candidates.len(), .candidates.join(", "))]
    AmbiguousMatch {
        identifier: String,
        candidates: Vec<String>,
    },

    /// Transport or connection failure; callers may retry
    #[error("Trainer directory unavailable: {0}")]
    BackingStoreUnavailable(String),
}

impl ResolutionError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionError::InvalidFormat(_) => "INVALID_FORMAT",
            ResolutionError::NotFound(_) => "NOT_FOUND",
            ResolutionError::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            ResolutionError::BackingStoreUnavailable(_) => "BACKING_STORE_UNAVAILABLE",
        }
    }
}

/// Successful resolution: the canonical record and the strategy that found it
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrainer {
    pub record: TrainerRecord,
    pub method: StrategyName,
}

/// Result of one `resolve` call
pub type ResolutionResult = Result<ResolvedTrainer, ResolutionError>;

// ============================================================================
// Records and profiles
// ============================================================================

/// Account role column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Trainer,
    Client,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Trainer => "trainer",
            UserRole::Client => "client",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trainer" | "personal" => Ok(UserRole::Trainer),
            "client" | "student" => Ok(UserRole::Client),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Canonical, strictly-typed trainer record
///
/// `None` on an optional column means the column is NULL; the profile
/// document may then supply the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub role: UserRole,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Raw profile document; coerced only when merged
    pub profile: Option<serde_json::Value>,
}

impl TrainerRecord {
    /// New trainer with only identity columns set
    pub fn new(id: Uuid, slug: impl Into<String>) -> Self {
        let now = fitmatch_common::time::now();
        Self {
            id,
            slug: slug.into(),
            name: None,
            email: None,
            city: None,
            specialties: None,
            role: UserRole::Trainer,
            is_active: None,
            is_verified: None,
            created_at: now,
            updated_at: now,
            profile: None,
        }
    }
}

/// The merged view every consumer operates on
///
/// Every field is always defined; see `merger` for precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedTrainerProfile {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub email: String,
    pub city: String,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub has_profile_document: bool,
    pub bio: String,
    /// Contact channel (WhatsApp/phone)
    pub phone: String,
    pub years_of_experience: u32,
    pub modalities: BTreeSet<String>,
    pub cities: BTreeSet<String>,
    pub specialties: BTreeSet<String>,
    pub gallery: Vec<String>,
    pub stories: Vec<String>,
    pub education: Vec<String>,
}

/// Partial update of the editable profile fields
///
/// `None` means "not part of this patch".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_of_experience: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cities: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialties: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<Vec<String>>,
}

fn overwrite<T>(slot: &mut Option<T>, later: Option<T>) {
    if later.is_some() {
        *slot = later;
    }
}

fn assign<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

fn clear_if_sent<T: PartialEq>(slot: &mut Option<T>, sent: &Option<T>) {
    if sent.is_some() && *slot == *sent {
        *slot = None;
    }
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }

    /// Names of the fields this patch sets, in declaration order
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut push = |set: bool, name: &'static str| {
            if set {
                names.push(name);
            }
        };
        push(self.name.is_some(), "name");
        push(self.email.is_some(), "email");
        push(self.city.is_some(), "city");
        push(self.bio.is_some(), "bio");
        push(self.phone.is_some(), "phone");
        push(self.years_of_experience.is_some(), "years_of_experience");
        push(self.modalities.is_some(), "modalities");
        push(self.cities.is_some(), "cities");
        push(self.specialties.is_some(), "specialties");
        push(self.gallery.is_some(), "gallery");
        push(self.stories.is_some(), "stories");
        push(self.education.is_some(), "education");
        names
    }

    /// Shallow merge: every field set in `later` replaces the field here
    pub fn merge_from(&mut self, later: ProfilePatch) {
        overwrite(&mut self.name, later.name);
        overwrite(&mut self.email, later.email);
        overwrite(&mut self.city, later.city);
        overwrite(&mut self.bio, later.bio);
        overwrite(&mut self.phone, later.phone);
        overwrite(&mut self.years_of_experience, later.years_of_experience);
        overwrite(&mut self.modalities, later.modalities);
        overwrite(&mut self.cities, later.cities);
        overwrite(&mut self.specialties, later.specialties);
        overwrite(&mut self.gallery, later.gallery);
        overwrite(&mut self.stories, later.stories);
        overwrite(&mut self.education, later.education);
    }

    /// Write every set field into a unified profile
    pub fn apply_to(&self, profile: &mut UnifiedTrainerProfile) {
        assign(&mut profile.name, &self.name);
        assign(&mut profile.email, &self.email);
        assign(&mut profile.city, &self.city);
        assign(&mut profile.bio, &self.bio);
        assign(&mut profile.phone, &self.phone);
        assign(&mut profile.years_of_experience, &self.years_of_experience);
        assign(&mut profile.modalities, &self.modalities);
        assign(&mut profile.cities, &self.cities);
        assign(&mut profile.specialties, &self.specialties);
        assign(&mut profile.gallery, &self.gallery);
        assign(&mut profile.stories, &self.stories);
        assign(&mut profile.education, &self.education);
    }

    /// Drop fields whose value is exactly what `sent` persisted.
    ///
    /// Fields edited again after `sent` was taken keep their newer value.
    pub fn clear_sent(&mut self, sent: &ProfilePatch) {
        clear_if_sent(&mut self.name, &sent.name);
        clear_if_sent(&mut self.email, &sent.email);
        clear_if_sent(&mut self.city, &sent.city);
        clear_if_sent(&mut self.bio, &sent.bio);
        clear_if_sent(&mut self.phone, &sent.phone);
        clear_if_sent(&mut self.years_of_experience, &sent.years_of_experience);
        clear_if_sent(&mut self.modalities, &sent.modalities);
        clear_if_sent(&mut self.cities, &sent.cities);
        clear_if_sent(&mut self.specialties, &sent.specialties);
        clear_if_sent(&mut self.gallery, &sent.gallery);
        clear_if_sent(&mut self.stories, &sent.stories);
        clear_if_sent(&mut self.education, &sent.education);
    }
}
