//! Multi-stage product mention matching.
//!
//! Three strategies run in fixed order behind the [`MatchArbiter`]: exact
//! alias containment, fuzzy brand/product similarity, and optional semantic
//! similarity over embeddings. The arbiter short-circuits at the first stage
//! whose score clears that stage's acceptance threshold, and falls back to
//! the sentinel unknown product when none does.

pub mod arbiter;
pub mod calibrate;
pub mod exact;
pub mod fuzzy;
pub mod semantic;

pub use arbiter::{MatchArbiter, MatchStats};
pub use calibrate::calibrate;
pub use exact::ExactAliasMatcher;
pub use fuzzy::FuzzyBrandProductMatcher;
pub use semantic::SemanticMatcher;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mention::Mention;
use crate::registry::RegistrySnapshot;

/// Sentinel product id for mentions no stage could resolve.
pub const UNKNOWN_PRODUCT: &str = "unknown_product";

/// Score assigned to fallback results.
pub const FALLBACK_SCORE: f64 = 0.1;

/// Which stage (or external path) produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactAlias,
    FuzzyBrandProduct,
    SemanticSimilarity,
    Fallback,
    /// Curated resolutions entering from outside the cascade.
    Manual,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchMethod::ExactAlias => "exact_alias",
            MatchMethod::FuzzyBrandProduct => "fuzzy_brand_product",
            MatchMethod::SemanticSimilarity => "semantic_similarity",
            MatchMethod::Fallback => "fallback",
            MatchMethod::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Audit booleans set by the confidence calibrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFactors {
    pub brand_mentioned: bool,
    pub product_type_mentioned: bool,
    pub identifier_mentioned: bool,
}

/// A ranked runner-up candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeMatch {
    pub product_id: String,
    pub score: f64,
}

/// Outcome of resolving one mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub product_id: String,
    pub match_method: MatchMethod,
    pub match_score: f64,
    #[serde(default)]
    pub alternative_matches: Vec<AlternativeMatch>,
    #[serde(default)]
    pub context_factors: ContextFactors,
}

impl MatchResult {
    /// The fixed result returned when no stage accepts.
    pub fn fallback() -> Self {
        Self {
            product_id: UNKNOWN_PRODUCT.into(),
            match_method: MatchMethod::Fallback,
            match_score: FALLBACK_SCORE,
            alternative_matches: Vec::new(),
            context_factors: ContextFactors::default(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.match_method == MatchMethod::Fallback
    }
}

/// A candidate produced by one stage, before arbitration.
#[derive(Debug, Clone)]
pub struct StageMatch {
    pub product_id: String,
    pub score: f64,
    pub alternatives: Vec<AlternativeMatch>,
}

/// One stage of the cascade. Stages are pure against the snapshot; the same
/// mention and snapshot always produce the same candidate.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn method(&self) -> MatchMethod;

    /// Best candidate for this mention, or `None` when the stage has nothing.
    fn attempt(&self, mention: &Mention, snapshot: &RegistrySnapshot) -> Option<StageMatch>;
}

/// Runners-up a stage keeps before the arbiter truncates to config.
pub(crate) const ALTERNATIVE_POOL: usize = 8;

/// Substring containment with word-boundary alignment on both ends, so a
/// short alias or brand never fires inside an unrelated longer word.
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() || phrase.len() > text.len() {
        return false;
    }
    let mut from = 0;
    while let Some(offset) = text[from..].find(phrase) {
        let begin = from + offset;
        let end = begin + phrase.len();
        let boundary_before = begin == 0
            || !text[..begin]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric);
        let boundary_after =
            end == text.len() || !text[end..].chars().next().is_some_and(char::is_alphanumeric);
        if boundary_before && boundary_after {
            return true;
        }
        from = begin + text[begin..].chars().next().map_or(1, char::len_utf8);
    }
    false
}
