//! Stage 1: exact alias containment.
//!
//! Looks for a canonical name or registered alias inside the normalized
//! mention. Containment requires word-boundary alignment on both ends, so a
//! short alias never fires inside an unrelated longer word. Winner selection
//! follows registry priority: canonical entries first, then longer aliases,
//! then registration order. A hit on a shared alias pulls in every product
//! claiming it, so losing contenders surface as alternates.

use crate::matcher::{AlternativeMatch, MatchMethod, MatchStrategy, StageMatch, contains_phrase};
use crate::mention::Mention;
use crate::registry::{AliasKind, RegistrySnapshot};

/// Score for a canonical-name hit.
pub const CANONICAL_SCORE: f64 = 0.95;
/// Score for an alias hit.
pub const ALIAS_SCORE: f64 = 0.90;

#[derive(Debug, Default)]
pub struct ExactAliasMatcher;

impl ExactAliasMatcher {
    pub fn new() -> Self {
        Self
    }
}

fn score_for(kind: AliasKind) -> f64 {
    match kind {
        AliasKind::Canonical => CANONICAL_SCORE,
        AliasKind::Alias => ALIAS_SCORE,
    }
}

impl MatchStrategy for ExactAliasMatcher {
    fn name(&self) -> &'static str {
        "exact_alias"
    }

    fn method(&self) -> MatchMethod {
        MatchMethod::ExactAlias
    }

    fn attempt(&self, mention: &Mention, snapshot: &RegistrySnapshot) -> Option<StageMatch> {
        let text = mention.normalized.as_str();
        if text.is_empty() {
            return None;
        }

        // Priority-ordered containment scan. Each hit expands its full alias
        // bucket, claims in bucket priority order, so the first push is the
        // overall winner and shared-alias losers ride along as alternates.
        let mut hits: Vec<(String, f64)> = Vec::new();
        for entry in snapshot.scan_entries() {
            if !contains_phrase(text, &entry.normalized) {
                continue;
            }
            if let Some(bucket) = snapshot.exact_bucket(&entry.normalized) {
                for claim in &bucket.claims {
                    push_hit(&mut hits, &claim.product_id, score_for(claim.kind));
                }
            }
        }

        let (product_id, score) = hits.first()?.clone();
        let alternatives = hits
            .iter()
            .skip(1)
            .map(|(id, s)| AlternativeMatch {
                product_id: id.clone(),
                score: *s,
            })
            .collect();

        Some(StageMatch {
            product_id,
            score,
            alternatives,
        })
    }
}

fn push_hit(hits: &mut Vec<(String, f64)>, product_id: &str, score: f64) {
    // Scan position fixes the order; a repeat hit can only raise the score.
    if let Some(hit) = hits.iter_mut().find(|(id, _)| id == product_id) {
        if score > hit.1 {
            hit.1 = score;
        }
        return;
    }
    hits.push((product_id.to_string(), score));
}
