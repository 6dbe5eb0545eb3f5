//! The trust atom: the append-only unit of product feedback.
//!
//! Atoms are immutable once synthesized; corrections are new atoms. Every
//! atom passes [`TrustAtom::validate`] before it is admitted to the graph.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AtomError;
use crate::matcher::MatchResult;

/// Where a piece of feedback was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Reddit,
    Youtube,
    Amazon,
    Forum,
    Twitter,
    Tiktok,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Reddit,
        Source::Youtube,
        Source::Amazon,
        Source::Forum,
        Source::Twitter,
        Source::Tiktok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::Youtube => "youtube",
            Source::Amazon => "amazon",
            Source::Forum => "forum",
            Source::Twitter => "twitter",
            Source::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| format!("unknown feedback source `{s}`"))
    }
}

/// Sentiment classification attached by the analysis capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 4] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Mixed => "mixed",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-shaped payload carried verbatim from collector to atom.
///
/// The variant is selected by the feedback source; sources without extra
/// context (forum, twitter, tiktok) use [`SourceData::Empty`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceData {
    Reddit {
        #[serde(default)]
        subreddit: Option<String>,
        #[serde(default)]
        post_title: Option<String>,
        #[serde(default)]
        post_score: Option<i64>,
    },
    Youtube {
        #[serde(default)]
        video_title: Option<String>,
        #[serde(default)]
        channel_name: Option<String>,
        #[serde(default)]
        video_views: Option<u64>,
        #[serde(default)]
        timestamp_in_video: Option<String>,
    },
    Amazon {
        #[serde(default)]
        product_title: Option<String>,
        #[serde(default)]
        star_rating: Option<u8>,
        #[serde(default)]
        review_title: Option<String>,
    },
    #[default]
    Empty,
}

impl SourceData {
    /// True when the payload variant is this source's own or the empty one.
    pub fn agrees_with(&self, source: Source) -> bool {
        matches!(
            (source, self),
            (_, SourceData::Empty)
                | (Source::Reddit, SourceData::Reddit { .. })
                | (Source::Youtube, SourceData::Youtube { .. })
                | (Source::Amazon, SourceData::Amazon { .. })
        )
    }
}

/// Provenance metadata. The username is only ever stored hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomMetadata {
    pub username_hash: String,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub permalink: Option<String>,
}

/// One unit of processed product feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustAtom {
    pub atom_id: String,
    pub product_id: String,
    pub source: Source,
    pub timestamp: DateTime<Utc>,
    pub feedback_text: String,
    pub summary_text: String,
    pub sentiment_label: SentimentLabel,
    pub authenticity_score: f64,
    pub confidence_score: f64,
    pub tags: Vec<String>,
    pub metadata: AtomMetadata,
    pub product_match_info: MatchResult,
    #[serde(default)]
    pub source_specific_data: SourceData,
}

impl TrustAtom {
    /// Schema check applied before an atom reaches the graph or the store.
    ///
    /// A failing atom is dropped with an audit entry; it is never partially
    /// admitted.
    pub fn validate(&self) -> Result<(), AtomError> {
        if self.atom_id.is_empty() {
            return Err(AtomError::MissingField { field: "atom_id" });
        }
        if self.product_id.is_empty() {
            return Err(AtomError::MissingField { field: "product_id" });
        }
        if self.feedback_text.trim().is_empty() {
            return Err(AtomError::EmptyText);
        }
        if self.metadata.username_hash.is_empty() {
            return Err(AtomError::MissingField {
                field: "metadata.username_hash",
            });
        }
        if !self.metadata.username_hash.starts_with("sha256:") {
            return Err(AtomError::Malformed {
                field: "metadata.username_hash",
                reason: "expected a `sha256:`-prefixed digest",
            });
        }
        if !self.source_specific_data.agrees_with(self.source) {
            return Err(AtomError::Malformed {
                field: "source_specific_data",
                reason: "payload variant does not match the source",
            });
        }
        check_unit("authenticity_score", self.authenticity_score)?;
        check_unit("confidence_score", self.confidence_score)?;
        check_unit("match_score", self.product_match_info.match_score)?;
        Ok(())
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), AtomError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AtomError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchMethod;

    pub(crate) fn sample_atom() -> TrustAtom {
        TrustAtom {
            atom_id: "reddit_cerave_foaming_cleanser_12oz_a1b2c3d4".into(),
            product_id: "cerave_foaming_cleanser_12oz".into(),
            source: Source::Reddit,
            timestamp: Utc::now(),
            feedback_text: "This cleanser cleared my skin in two weeks".into(),
            summary_text: "This cleanser cleared my skin in two weeks".into(),
            sentiment_label: SentimentLabel::Positive,
            authenticity_score: 0.6,
            confidence_score: 0.85,
            tags: vec!["effective".into()],
            metadata: AtomMetadata {
                username_hash: "sha256:0011223344556677".into(),
                upvotes: 12,
                permalink: None,
            },
            product_match_info: MatchResult {
                product_id: "cerave_foaming_cleanser_12oz".into(),
                match_method: MatchMethod::ExactAlias,
                match_score: 0.95,
                alternative_matches: vec![],
                context_factors: Default::default(),
            },
            source_specific_data: SourceData::Reddit {
                subreddit: Some("SkincareAddiction".into()),
                post_title: None,
                post_score: Some(40),
            },
        }
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&Source::Tiktok).unwrap(),
            "\"tiktok\""
        );
        assert_eq!(
            serde_json::to_string(&SentimentLabel::Mixed).unwrap(),
            "\"mixed\""
        );
        assert_eq!("youtube".parse::<Source>().unwrap(), Source::Youtube);
        assert!("myspace".parse::<Source>().is_err());
    }

    #[test]
    fn valid_atom_passes_schema_check() {
        assert!(sample_atom().validate().is_ok());
    }

    #[test]
    fn missing_username_hash_rejected() {
        let mut atom = sample_atom();
        atom.metadata.username_hash.clear();
        let err = atom.validate().unwrap_err();
        assert!(matches!(
            err,
            AtomError::MissingField {
                field: "metadata.username_hash"
            }
        ));
    }

    #[test]
    fn unprefixed_username_hash_rejected() {
        let mut atom = sample_atom();
        atom.metadata.username_hash = "reviewer42".into();
        assert!(matches!(
            atom.validate().unwrap_err(),
            AtomError::Malformed {
                field: "metadata.username_hash",
                ..
            }
        ));
    }

    #[test]
    fn payload_variant_must_agree_with_source() {
        let mut atom = sample_atom();
        atom.source = Source::Youtube; // payload stays reddit-shaped
        assert!(matches!(
            atom.validate().unwrap_err(),
            AtomError::Malformed {
                field: "source_specific_data",
                ..
            }
        ));

        atom.source_specific_data = SourceData::Empty;
        assert!(atom.validate().is_ok());
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let mut atom = sample_atom();
        atom.confidence_score = 1.2;
        assert!(matches!(
            atom.validate().unwrap_err(),
            AtomError::OutOfRange {
                field: "confidence_score",
                ..
            }
        ));

        let mut atom = sample_atom();
        atom.authenticity_score = f64::NAN;
        assert!(atom.validate().is_err());
    }

    #[test]
    fn serialized_atom_carries_required_fields() {
        let value = serde_json::to_value(sample_atom()).unwrap();
        for field in [
            "atom_id",
            "product_id",
            "source",
            "timestamp",
            "feedback_text",
            "summary_text",
            "sentiment_label",
            "authenticity_score",
            "confidence_score",
            "tags",
            "metadata",
            "product_match_info",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(value["metadata"]["username_hash"], "sha256:0011223344556677");
        assert_eq!(value["source_specific_data"]["kind"], "reddit");
        // ISO-8601 UTC with explicit offset designator.
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z') || ts.contains("+00:00"));
    }
}
