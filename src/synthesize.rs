//! Trust atom synthesis: the pure assembly step between matching, analysis,
//! and the graph.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::atom::{AtomMetadata, SentimentLabel, Source, SourceData, TrustAtom};
use crate::config::SynthesisConfig;
use crate::matcher::MatchResult;
use crate::mention::Feedback;

/// Analysis outputs consumed by synthesis. Produced by a
/// [`ContentAnalysis`](crate::analysis::ContentAnalysis) implementation.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub sentiment_label: SentimentLabel,
    pub sentiment_confidence: f64,
    pub tags: Vec<String>,
    pub summary: String,
    pub authenticity: f64,
}

/// Builds trust atoms from a feedback record, its calibrated match, and the
/// analysis outputs. Stateless apart from the blend weights.
#[derive(Debug, Clone)]
pub struct AtomSynthesizer {
    weights: SynthesisConfig,
}

impl AtomSynthesizer {
    pub fn new(weights: SynthesisConfig) -> Self {
        Self { weights }
    }

    /// Assemble one atom. Never fails; schema validation happens at graph
    /// admission, not here.
    pub fn synthesize(
        &self,
        feedback: &Feedback,
        match_result: MatchResult,
        analysis: Analysis,
    ) -> TrustAtom {
        let confidence_score = self.weights.match_weight * match_result.match_score
            + self.weights.sentiment_weight * analysis.sentiment_confidence;

        let summary_text = if analysis.summary.trim().is_empty() {
            feedback.text.clone()
        } else {
            analysis.summary
        };

        let mut tags = analysis.tags;
        tags.sort();
        tags.dedup();

        TrustAtom {
            atom_id: atom_id(feedback.source, &match_result.product_id),
            product_id: match_result.product_id.clone(),
            source: feedback.source,
            timestamp: feedback.timestamp.unwrap_or_else(Utc::now),
            feedback_text: feedback.text.clone(),
            summary_text,
            sentiment_label: analysis.sentiment_label,
            authenticity_score: analysis.authenticity,
            confidence_score,
            tags,
            metadata: AtomMetadata {
                username_hash: hash_username(feedback.username.as_deref()),
                upvotes: feedback.score,
                permalink: feedback.permalink.clone(),
            },
            source_specific_data: payload_for(feedback),
            product_match_info: match_result,
        }
    }
}

/// `<source>_<product_id>_<8 hex chars>`, unique per synthesis call.
fn atom_id(source: Source, product_id: &str) -> String {
    let suffix: u32 = rand::random();
    format!("{source}_{product_id}_{suffix:08x}")
}

/// SHA-256 of the username, truncated to 16 hex chars. Raw usernames never
/// leave this function.
fn hash_username(username: Option<&str>) -> String {
    match username {
        Some(name) if !name.is_empty() => {
            let digest = Sha256::digest(name.as_bytes());
            let hex = hex::encode(digest);
            format!("sha256:{}", &hex[..16])
        }
        _ => "sha256:anonymous".to_string(),
    }
}

/// Carry the collector payload only when its variant agrees with the source.
fn payload_for(feedback: &Feedback) -> SourceData {
    if feedback.data.agrees_with(feedback.source) {
        feedback.data.clone()
    } else {
        SourceData::Empty
    }
}
