//! The match arbiter: fixed-order cascade with per-stage acceptance.
//!
//! Stages run in the order they were installed. The first stage whose score
//! strictly exceeds its acceptance threshold wins and later stages are never
//! invoked. When nothing accepts, the arbiter returns the fixed fallback
//! result and writes exactly one unmatched-suggestion entry.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::matcher::{
    ExactAliasMatcher, FuzzyBrandProductMatcher, MatchResult, MatchStrategy, SemanticMatcher,
};
use crate::mention::Mention;
use crate::registry::RegistrySnapshot;
use crate::suggestions::SuggestionLog;

struct StageSlot {
    strategy: Box<dyn MatchStrategy>,
    accept: f64,
    invocations: AtomicUsize,
    accepts: AtomicUsize,
}

/// Per-stage invocation counts, observable for audit and tests.
#[derive(Debug, Clone)]
pub struct MatchStats {
    pub stages: Vec<StageStats>,
    pub fallbacks: usize,
}

#[derive(Debug, Clone)]
pub struct StageStats {
    pub name: &'static str,
    pub invocations: usize,
    pub accepts: usize,
}

pub struct MatchArbiter {
    stages: Vec<StageSlot>,
    max_alternatives: usize,
    suggestions: Arc<SuggestionLog>,
    fallbacks: AtomicUsize,
}

impl MatchArbiter {
    /// Standard cascade: exact alias, then fuzzy brand/product.
    pub fn new(config: &MatchConfig, suggestions: Arc<SuggestionLog>) -> Self {
        let arbiter = Self {
            stages: Vec::new(),
            max_alternatives: config.max_alternatives,
            suggestions,
            fallbacks: AtomicUsize::new(0),
        };
        arbiter
            .with_stage(Box::new(ExactAliasMatcher::new()), config.exact_accept)
            .with_stage(
                Box::new(FuzzyBrandProductMatcher::new()),
                config.fuzzy_accept,
            )
    }

    /// Append a stage with its acceptance threshold.
    pub fn with_stage(mut self, strategy: Box<dyn MatchStrategy>, accept: f64) -> Self {
        self.stages.push(StageSlot {
            strategy,
            accept,
            invocations: AtomicUsize::new(0),
            accepts: AtomicUsize::new(0),
        });
        self
    }

    /// Append the optional semantic stage.
    pub fn with_semantic(self, matcher: SemanticMatcher, accept: f64) -> Self {
        self.with_stage(Box::new(matcher), accept)
    }

    /// Resolve one mention against a snapshot.
    ///
    /// Returns the winning stage's result, or the fallback plus one
    /// suggestion-log entry when no stage accepts. Blank mentions are a
    /// caller error; the pipeline skips them before getting here.
    pub fn resolve(
        &self,
        mention: &Mention,
        snapshot: &RegistrySnapshot,
    ) -> Result<MatchResult, MatchError> {
        if mention.is_blank() {
            return Err(MatchError::EmptyMention);
        }

        for slot in &self.stages {
            slot.invocations.fetch_add(1, Ordering::Relaxed);
            let Some(candidate) = slot.strategy.attempt(mention, snapshot) else {
                continue;
            };
            if candidate.score > slot.accept {
                slot.accepts.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    stage = slot.strategy.name(),
                    product_id = %candidate.product_id,
                    score = candidate.score,
                    "stage accepted"
                );
                let mut alternatives = candidate.alternatives;
                alternatives.truncate(self.max_alternatives);
                return Ok(MatchResult {
                    product_id: candidate.product_id,
                    match_method: slot.strategy.method(),
                    match_score: candidate.score.clamp(0.0, 1.0),
                    alternative_matches: alternatives,
                    context_factors: Default::default(),
                });
            }
            tracing::trace!(
                stage = slot.strategy.name(),
                score = candidate.score,
                threshold = slot.accept,
                "stage below threshold"
            );
        }

        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        self.suggestions.append(&mention.raw)?;
        tracing::debug!(mention = %mention.raw, "no stage accepted, falling back");
        Ok(MatchResult::fallback())
    }

    /// Snapshot of invocation counters.
    pub fn stats(&self) -> MatchStats {
        MatchStats {
            stages: self
                .stages
                .iter()
                .map(|slot| StageStats {
                    name: slot.strategy.name(),
                    invocations: slot.invocations.load(Ordering::Relaxed),
                    accepts: slot.accepts.load(Ordering::Relaxed),
                })
                .collect(),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    pub fn suggestions(&self) -> &SuggestionLog {
        &self.suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchMethod, StageMatch};
    use crate::registry::CanonicalProduct;

    fn snapshot() -> RegistrySnapshot {
        RegistrySnapshot::from_products(vec![CanonicalProduct {
            product_id: "cerave_foaming_cleanser_12oz".into(),
            canonical_name: "CeraVe Foaming Facial Cleanser".into(),
            brand: "CeraVe".into(),
            category: "skincare".into(),
            product_type: "cleanser".into(),
            aliases: vec!["cerave cleanser".into()],
            identifiers: Default::default(),
            status: "active".into(),
            verification_sources: vec![],
        }])
    }

    fn arbiter() -> MatchArbiter {
        MatchArbiter::new(&MatchConfig::default(), Arc::new(SuggestionLog::new()))
    }

    #[test]
    fn stage_one_accept_short_circuits_later_stages() {
        let arbiter = arbiter();
        let result = arbiter
            .resolve(&Mention::new("I love my cerave cleanser"), &snapshot())
            .unwrap();
        assert_eq!(result.match_method, MatchMethod::ExactAlias);
        assert_eq!(result.product_id, "cerave_foaming_cleanser_12oz");
        assert!(result.match_score >= 0.9);

        let stats = arbiter.stats();
        assert_eq!(stats.stages[0].invocations, 1);
        assert_eq!(stats.stages[0].accepts, 1);
        assert_eq!(stats.stages[1].invocations, 0);
    }

    #[test]
    fn fallback_writes_exactly_one_suggestion_entry() {
        let arbiter = arbiter();
        let result = arbiter
            .resolve(&Mention::new("my face wash is amazing"), &snapshot())
            .unwrap();
        assert!(result.is_fallback());
        assert_eq!(result.product_id, "unknown_product");
        assert_eq!(result.match_score, 0.1);

        let entries = arbiter.suggestions().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mention_text, "my face wash is amazing");
        assert_eq!(arbiter.stats().fallbacks, 1);
    }

    #[test]
    fn blank_mention_is_an_error_and_writes_nothing() {
        let arbiter = arbiter();
        let err = arbiter
            .resolve(&Mention::new("https://example.com"), &snapshot())
            .unwrap_err();
        assert!(matches!(err, MatchError::EmptyMention));
        assert!(arbiter.suggestions().is_empty());
    }

    struct FixedStage {
        score: f64,
    }

    impl MatchStrategy for FixedStage {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn method(&self) -> MatchMethod {
            MatchMethod::SemanticSimilarity
        }

        fn attempt(&self, _m: &Mention, _s: &RegistrySnapshot) -> Option<StageMatch> {
            Some(StageMatch {
                product_id: "fixed_product".into(),
                score: self.score,
                alternatives: vec![],
            })
        }
    }

    #[test]
    fn score_equal_to_threshold_does_not_accept() {
        let suggestions = Arc::new(SuggestionLog::new());
        let arbiter = MatchArbiter {
            stages: Vec::new(),
            max_alternatives: 3,
            suggestions,
            fallbacks: AtomicUsize::new(0),
        }
        .with_stage(Box::new(FixedStage { score: 0.5 }), 0.5);

        let result = arbiter
            .resolve(&Mention::new("some mention"), &snapshot())
            .unwrap();
        assert!(result.is_fallback());

        let above = MatchArbiter {
            stages: Vec::new(),
            max_alternatives: 3,
            suggestions: Arc::new(SuggestionLog::new()),
            fallbacks: AtomicUsize::new(0),
        }
        .with_stage(Box::new(FixedStage { score: 0.51 }), 0.5);
        let result = above
            .resolve(&Mention::new("some mention"), &snapshot())
            .unwrap();
        assert_eq!(result.product_id, "fixed_product");
    }

    #[test]
    fn raised_threshold_pushes_resolution_to_next_stage() {
        let config = MatchConfig {
            exact_accept: 0.99,
            ..Default::default()
        };
        let arbiter = MatchArbiter::new(&config, Arc::new(SuggestionLog::new()));
        // Alias hit scores 0.90, under the raised stage-1 bar; the fuzzy
        // stage sees the brand and the near-identical name instead.
        let result = arbiter
            .resolve(
                &Mention::new("cerave foaming facial cleanser is great"),
                &snapshot(),
            )
            .unwrap();
        assert_eq!(result.match_method, MatchMethod::FuzzyBrandProduct);
        assert_eq!(result.product_id, "cerave_foaming_cleanser_12oz");

        let stats = arbiter.stats();
        assert_eq!(stats.stages[0].invocations, 1);
        assert_eq!(stats.stages[0].accepts, 0);
        assert_eq!(stats.stages[1].invocations, 1);
        assert_eq!(stats.stages[1].accepts, 1);
    }

    #[test]
    fn alternatives_truncated_to_config() {
        let mut products = Vec::new();
        for i in 1..=6 {
            products.push(CanonicalProduct {
                product_id: format!("wash_{i}"),
                canonical_name: format!("Acme Face Wash Classic {i}"),
                brand: "Acme".into(),
                category: String::new(),
                product_type: String::new(),
                aliases: vec![],
                identifiers: Default::default(),
                status: "active".into(),
                verification_sources: vec![],
            });
        }
        let snap = RegistrySnapshot::from_products(products);
        let arbiter = MatchArbiter::new(&MatchConfig::default(), Arc::new(SuggestionLog::new()));
        // All six names are near-identical to the mention, so the fuzzy
        // stage produces five runners-up before truncation.
        let result = arbiter
            .resolve(&Mention::new("acme face wash classic"), &snap)
            .unwrap();
        assert_eq!(result.match_method, MatchMethod::FuzzyBrandProduct);
        assert_eq!(result.product_id, "wash_1");
        assert_eq!(result.alternative_matches.len(), 3);
    }
}
