//! Phrase models and data structures
//!
//! This module defines the phrase payload produced by the generation
//! service, the stored record with its rotation bookkeeping, and the
//! report of a generation run.

use crate::error::{PhraseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level fields the generation service must return
pub const REQUIRED_FIELDS: &[&str] = &["category", "message"];

/// Categories the prompt asks for. Other values are accepted as-is.
pub const KNOWN_CATEGORIES: &[&str] = &["Love", "Faith", "Hope", "Gratitude", "Strength"];

/// A single positive phrase as served to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub message: String,
    pub category: String,
}

impl Phrase {
    pub fn new<M: Into<String>, C: Into<String>>(message: M, category: C) -> Self {
        Self {
            message: message.into(),
            category: category.into(),
        }
    }

    /// Reject phrases whose fields are present but blank.
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(PhraseError::incomplete("category is empty"));
        }

        if self.message.trim().is_empty() {
            return Err(PhraseError::incomplete("message is empty"));
        }

        Ok(())
    }

    pub fn is_known_category(&self) -> bool {
        KNOWN_CATEGORIES.contains(&self.category.as_str())
    }
}

/// A phrase as kept in storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPhrase {
    pub id: Uuid,
    pub message: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    /// When the phrase was last served, `None` if never
    pub last_used_at: Option<DateTime<Utc>>,
}

impl StoredPhrase {
    pub fn new(phrase: &Phrase, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: phrase.message.clone(),
            category: phrase.category.clone(),
            created_at,
            last_used_at: None,
        }
    }

    pub fn to_phrase(&self) -> Phrase {
        Phrase::new(self.message.clone(), self.category.clone())
    }
}

/// Response envelope for the daily phrase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phrase: Option<Phrase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PhraseResponse {
    pub fn ok(phrase: Phrase) -> Self {
        Self {
            success: true,
            phrase: Some(phrase),
            message: None,
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            phrase: None,
            message: Some(message.into()),
        }
    }
}

/// Outcome of one generation job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub success: bool,
    pub message: String,
    pub attempts: u32,
    pub total_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phrase: Option<Phrase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(Phrase::new("Shine today", "Hope").validate().is_ok());
        assert!(matches!(
            Phrase::new("Shine today", "  ").validate(),
            Err(PhraseError::IncompleteResponse(_))
        ));
        assert!(matches!(
            Phrase::new("", "Hope").validate(),
            Err(PhraseError::IncompleteResponse(_))
        ));
    }

    #[test]
    fn test_known_category() {
        assert!(Phrase::new("x", "Gratitude").is_known_category());
        assert!(!Phrase::new("x", "Courage").is_known_category());
    }

    #[test]
    fn test_stored_phrase_starts_unused() {
        let now = Utc::now();
        let stored = StoredPhrase::new(&Phrase::new("m", "Love"), now);
        assert_eq!(stored.created_at, now);
        assert!(stored.last_used_at.is_none());
        assert_eq!(stored.to_phrase(), Phrase::new("m", "Love"));
    }

    #[test]
    fn test_response_envelope_shape() {
        let ok = serde_json::to_value(PhraseResponse::ok(Phrase::new("m", "Faith"))).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"success": true, "phrase": {"message": "m", "category": "Faith"}})
        );

        let failed = serde_json::to_value(PhraseResponse::failed("nope")).unwrap();
        assert_eq!(failed, serde_json::json!({"success": false, "message": "nope"}));
    }
}
