//! Mention and feedback input types.
//!
//! A [`Feedback`] record is what the upstream collectors hand us: cleaned
//! text plus source context. A [`Mention`] is the transient matching view of
//! that text, carrying the normalized form every matcher operates on. Neither
//! is persisted; only synthesized trust atoms are.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::atom::{Source, SourceData};
use crate::normalize::normalize;

/// Optional context hints supplied by upstream preprocessing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentionHints {
    /// Brand the collector believes is being discussed.
    #[serde(default)]
    pub brand: Option<String>,
    /// Product type the collector believes is being discussed.
    #[serde(default)]
    pub product_type: Option<String>,
    /// Sentence surrounding the mention, when the text is an excerpt.
    #[serde(default)]
    pub sentence: Option<String>,
}

/// Transient value passed through the match cascade.
#[derive(Debug, Clone)]
pub struct Mention {
    pub raw: String,
    pub normalized: String,
    pub hints: MentionHints,
}

impl Mention {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self {
            raw,
            normalized,
            hints: MentionHints::default(),
        }
    }

    pub fn with_hints(raw: impl Into<String>, hints: MentionHints) -> Self {
        let mut mention = Self::new(raw);
        mention.hints = hints;
        mention
    }

    /// True when nothing usable survived normalization. Such mentions are
    /// skipped: no match, no atom, no suggestion-log entry.
    pub fn is_blank(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// One standardized piece of user feedback from a collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub text: String,
    pub source: Source,
    /// Collector-supplied UTC timestamp; synthesis fills in "now" if absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub username: Option<String>,
    /// Upvotes, likes, or helpful votes depending on the source.
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub permalink: Option<String>,
    /// Author account age, when the collector knows it.
    #[serde(default)]
    pub account_age_days: Option<u32>,
    /// Verified-purchase flag on retail reviews.
    #[serde(default)]
    pub verified_purchase: Option<bool>,
    #[serde(default)]
    pub hints: MentionHints,
    /// Source-shaped payload carried through to the atom.
    #[serde(default)]
    pub data: SourceData,
}

impl Feedback {
    pub fn new(text: impl Into<String>, source: Source) -> Self {
        Self {
            text: text.into(),
            source,
            timestamp: None,
            username: None,
            score: 0,
            permalink: None,
            account_age_days: None,
            verified_purchase: None,
            hints: MentionHints::default(),
            data: SourceData::Empty,
        }
    }

    /// The matching view of this record.
    pub fn mention(&self) -> Mention {
        Mention::with_hints(self.text.clone(), self.hints.clone())
    }
}
