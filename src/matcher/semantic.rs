//! Stage 3: semantic similarity over precomputed product embeddings.
//!
//! Optional. The mention is embedded through the configured provider and
//! compared by cosine against each product's vector. Any provider failure or
//! timeout skips this stage; it never fails the overall match.

use std::sync::Arc;

use crate::embed::{Embedder, ProductEmbeddings, cosine};
use crate::matcher::{
    ALTERNATIVE_POOL, AlternativeMatch, MatchMethod, MatchStrategy, StageMatch,
};
use crate::mention::Mention;
use crate::registry::RegistrySnapshot;

pub struct SemanticMatcher {
    embedder: Arc<dyn Embedder>,
    embeddings: Arc<ProductEmbeddings>,
}

impl SemanticMatcher {
    pub fn new(embedder: Arc<dyn Embedder>, embeddings: Arc<ProductEmbeddings>) -> Self {
        Self {
            embedder,
            embeddings,
        }
    }
}

impl MatchStrategy for SemanticMatcher {
    fn name(&self) -> &'static str {
        "semantic_similarity"
    }

    fn method(&self) -> MatchMethod {
        MatchMethod::SemanticSimilarity
    }

    fn attempt(&self, mention: &Mention, _snapshot: &RegistrySnapshot) -> Option<StageMatch> {
        if self.embeddings.is_empty() {
            return None;
        }

        let query = match self.embedder.embed(&mention.raw) {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "semantic stage skipped");
                return None;
            }
        };

        let mut scored: Vec<(String, f64)> = self
            .embeddings
            .iter()
            .filter_map(|(id, vector)| {
                cosine(&query, vector).map(|score| (id.to_string(), score.max(0.0)))
            })
            .collect();
        if scored.is_empty() {
            tracing::debug!("no comparable product embeddings for mention");
            return None;
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let (product_id, score) = scored[0].clone();
        let alternatives = scored
            .into_iter()
            .skip(1)
            .take(ALTERNATIVE_POOL)
            .map(|(id, s)| AlternativeMatch {
                product_id: id,
                score: s,
            })
            .collect();

        Some(StageMatch {
            product_id,
            score,
            alternatives,
        })
    }
}
