//! Weighted profile completion score
//!
//! Required fields weigh twice as much as optional ones. The score is
//! `round(100 * present_weight / total_weight)` with halves rounded up,
//! except that a profile missing any field never shows 100.

use serde::Serialize;
use serde_json::Value;

/// Score plus the required fields still blocking a complete profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub percentage: u8,
    pub missing_required: Vec<&'static str>,
}

pub const REQUIRED_WEIGHT: u32 = 2;
pub const OPTIONAL_WEIGHT: u32 = 1;

/// Field partition for one editing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRule {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl CompletionRule {
    pub const fn new(required: &'static [&'static str], optional: &'static [&'static str]) -> Self {
        Self { required, optional }
    }

    /// Trainer profile editor
    pub const fn trainer() -> Self {
        Self::new(
            &["name", "email", "phone", "bio", "specialties"],
            &[
                "city",
                "cities",
                "modalities",
                "years_of_experience",
                "gallery",
                "stories",
                "education",
            ],
        )
    }

    /// Client (student) profile editor.
    ///
    /// Client profiles are not modelled as a typed struct here; this rule
    /// scores the client's raw JSON profile document via [`Self::score_value`].
    pub const fn client() -> Self {
        Self::new(
            &["name", "email", "phone", "city", "fitness_level"],
            &["goals", "birth_date", "gender", "avatar"],
        )
    }

    fn total_weight(&self) -> u32 {
        self.required.len() as u32 * REQUIRED_WEIGHT + self.optional.len() as u32 * OPTIONAL_WEIGHT
    }

    /// Score any serializable profile; unserializable input scores 0
    pub fn score<T: Serialize>(&self, profile: &T) -> u8 {
        match serde_json::to_value(profile) {
            Ok(value) => self.score_value(&value),
            Err(_) => 0,
        }
    }

    /// Score and missing required fields in one serialization pass
    pub fn assess<T: Serialize>(&self, profile: &T) -> CompletionReport {
        match serde_json::to_value(profile) {
            Ok(value) => CompletionReport {
                percentage: self.score_value(&value),
                missing_required: self.missing_required(&value),
            },
            Err(_) => CompletionReport {
                percentage: 0,
                missing_required: self.required.to_vec(),
            },
        }
    }

    /// Score a JSON object. Anything that is not an object has no fields.
    pub fn score_value(&self, profile: &Value) -> u8 {
        let total = self.total_weight();
        if total == 0 {
            return 0;
        }

        let present = |field: &str| profile.get(field).is_some_and(is_present);
        let required = self.required.iter().filter(|field| present(**field)).count() as u32;
        let optional = self.optional.iter().filter(|field| present(**field)).count() as u32;
        let earned = required * REQUIRED_WEIGHT + optional * OPTIONAL_WEIGHT;

        let score = (200 * earned + total) / (2 * total);
        if earned < total {
            score.min(99) as u8
        } else {
            100
        }
    }

    /// Required fields not yet filled in, in rule order
    pub fn missing_required(&self, profile: &Value) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|field| !profile.get(*field).is_some_and(is_present))
            .collect()
    }
}

/// Whether a field value counts toward completion
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_required_only_scores_71() {
        let profile = json!({
            "name": "Bruno Lima",
            "email": "bruno@example.com",
            "phone": "+55 81 97777-0000",
            "city": "Recife",
            "fitness_level": "beginner",
        });
        assert_eq!(CompletionRule::client().score_value(&profile), 71);
    }

    #[test]
    fn test_full_profile_scores_100() {
        let profile = json!({
            "name": "Bruno Lima",
            "email": "bruno@example.com",
            "phone": "+55 81 97777-0000",
            "city": "Recife",
            "fitness_level": "beginner",
            "goals": ["hipertrofia"],
            "birth_date": "1990-04-01",
            "gender": "m",
            "avatar": "avatar.jpg",
        });
        assert_eq!(CompletionRule::client().score_value(&profile), 100);
    }

    #[test]
    fn test_nearly_full_profile_never_reaches_100() {
        // 200 of 201 weight units rounds to 100 without the cap
        let names: Vec<&'static str> = (0..201)
            .map(|i| &*Box::leak(format!("f{}", i).into_boxed_str()))
            .collect();
        let rule = CompletionRule::new(&[], Box::leak(names.into_boxed_slice()));

        let mut profile = serde_json::Map::new();
        for field in rule.optional.iter().skip(1) {
            profile.insert(field.to_string(), json!("x"));
        }
        assert_eq!(rule.score_value(&Value::Object(profile)), 99);
    }

    #[test]
    fn test_half_rounds_up() {
        // 2 of 4 weight units -> 50; 1 of 8 -> 12.5 -> 13
        let rule = CompletionRule::new(&["a", "b"], &[]);
        assert_eq!(rule.score_value(&json!({ "a": "x" })), 50);

        let rule = CompletionRule::new(&[], &["a", "b", "c", "d", "e", "f", "g", "h"]);
        assert_eq!(rule.score_value(&json!({ "a": "x" })), 13);
    }

    #[test]
    fn test_empty_rule_scores_zero() {
        let rule = CompletionRule::new(&[], &[]);
        assert_eq!(rule.score_value(&json!({ "name": "Ana" })), 0);
    }

    #[test]
    fn test_non_object_scores_zero() {
        assert_eq!(CompletionRule::trainer().score_value(&json!("Ana")), 0);
        assert_eq!(CompletionRule::trainer().score_value(&Value::Null), 0);
    }

    #[test]
    fn test_presence_rules() {
        assert!(!is_present(&json!("   ")));
        assert!(!is_present(&json!([])));
        assert!(!is_present(&json!(false)));
        assert!(!is_present(&json!(0)));
        assert!(!is_present(&json!(0.0)));
        assert!(!is_present(&Value::Null));
        assert!(is_present(&json!("x")));
        assert!(is_present(&json!(["x"])));
        assert!(is_present(&json!(true)));
        assert!(is_present(&json!(3)));
    }

    #[test]
    fn test_score_always_in_range() {
        let rule = CompletionRule::trainer();
        let fields: Vec<&str> = rule.required.iter().chain(rule.optional.iter()).copied().collect();

        // Every subset of the 12 trainer fields
        for mask in 0u32..(1 << fields.len()) {
            let mut profile = serde_json::Map::new();
            for (i, field) in fields.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    profile.insert(field.to_string(), json!(["x"]));
                }
            }
            let score = rule.score_value(&Value::Object(profile));
            assert!(score <= 100);
            assert_eq!(score == 100, mask == (1 << fields.len()) - 1);
        }
    }

    #[test]
    fn test_assess_merged_trainer_profile() {
        use crate::merger::merge_profile;
        use crate::types::TrainerRecord;

        let mut record = TrainerRecord::new(uuid::Uuid::new_v4(), "ana-souza");
        record.name = Some("Ana Souza".to_string());
        record.profile = Some(json!({ "bio": "Oi", "years_of_experience": 8 }));
        let profile = merge_profile(&record);

        let report = CompletionRule::trainer().assess(&profile);
        // name + bio of required (4), years of optional (1): 5 of 17
        assert_eq!(report.percentage, 29);
        assert_eq!(report.percentage, CompletionRule::trainer().score(&profile));
        assert_eq!(report.missing_required, vec!["email", "phone", "specialties"]);
    }

    #[test]
    fn test_missing_required() {
        let profile = json!({ "name": "Ana", "email": "", "bio": "Oi" });
        assert_eq!(
            CompletionRule::trainer().missing_required(&profile),
            vec!["email", "phone", "specialties"]
        );
    }
}
