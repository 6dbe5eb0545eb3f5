//! Context calibration: post-match score boosts from corroborating signals
//! in the mention text.

use crate::matcher::{MatchResult, contains_phrase};
use crate::mention::Mention;
use crate::normalize::normalize;
use crate::registry::RegistrySnapshot;

const BRAND_BONUS: f64 = 0.10;
const TYPE_BONUS: f64 = 0.05;
const IDENTIFIER_BONUS: f64 = 0.20;

/// Boost a match score when the mention corroborates the matched product.
///
/// Brand and product type are checked case-insensitively against the
/// normalized mention; identifiers (ASINs, UPCs) must appear verbatim in
/// the raw text. Fallback results are never calibrated, and the boosted
/// score is capped at 1.0. The factors that fired are recorded on the
/// result for audit.
pub fn calibrate(result: &mut MatchResult, mention: &Mention, snapshot: &RegistrySnapshot) {
    if result.is_fallback() {
        return;
    }
    let Some(product) = snapshot.get(&result.product_id) else {
        return;
    };

    let mut boost = 0.0;

    let brand = normalize(&product.brand);
    if contains_phrase(&mention.normalized, &brand) {
        result.context_factors.brand_mentioned = true;
        boost += BRAND_BONUS;
    }

    let product_type = normalize(&product.product_type);
    if contains_phrase(&mention.normalized, &product_type) {
        result.context_factors.product_type_mentioned = true;
        boost += TYPE_BONUS;
    }

    if product
        .identifiers
        .values()
        .any(|id| !id.is_empty() && mention.raw.contains(id.as_str()))
    {
        result.context_factors.identifier_mentioned = true;
        boost += IDENTIFIER_BONUS;
    }

    if boost > 0.0 {
        result.match_score = (result.match_score + boost).min(1.0);
        tracing::trace!(
            product_id = %result.product_id,
            score = result.match_score,
            "context calibration applied"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchMethod;
    use crate::registry::CanonicalProduct;
    use std::collections::BTreeMap;

    fn snapshot() -> RegistrySnapshot {
        let mut identifiers = BTreeMap::new();
        identifiers.insert("asin".to_string(), "B01N1LL62W".to_string());
        RegistrySnapshot::from_products(vec![CanonicalProduct {
            product_id: "cerave_foaming_cleanser_12oz".into(),
            canonical_name: "CeraVe Foaming Facial Cleanser".into(),
            brand: "CeraVe".into(),
            category: "skincare".into(),
            product_type: "cleanser".into(),
            aliases: vec!["cerave cleanser".into()],
            identifiers,
            status: "active".into(),
            verification_sources: vec![],
        }])
    }

    fn matched(score: f64) -> MatchResult {
        MatchResult {
            product_id: "cerave_foaming_cleanser_12oz".into(),
            match_method: MatchMethod::ExactAlias,
            match_score: score,
            alternative_matches: vec![],
            context_factors: Default::default(),
        }
    }

    #[test]
    fn brand_and_type_boost_with_cap() {
        let mention = Mention::new("my CeraVe cleanser cleared my skin");
        let mut result = matched(0.90);
        calibrate(&mut result, &mention, &snapshot());
        // 0.90 + 0.10 (brand) + 0.05 (type), capped.
        assert_eq!(result.match_score, 1.0);
        assert!(result.context_factors.brand_mentioned);
        assert!(result.context_factors.product_type_mentioned);
        assert!(!result.context_factors.identifier_mentioned);
    }

    #[test]
    fn identifier_must_match_case_sensitively() {
        let snapshot = snapshot();

        let mention = Mention::new("bought B01N1LL62W yesterday");
        let mut result = matched(0.70);
        calibrate(&mut result, &mention, &snapshot);
        assert!(result.context_factors.identifier_mentioned);
        assert!((result.match_score - 0.90).abs() < 1e-12);

        let mention = Mention::new("bought b01n1ll62w yesterday");
        let mut result = matched(0.70);
        calibrate(&mut result, &mention, &snapshot);
        assert!(!result.context_factors.identifier_mentioned);
        assert!((result.match_score - 0.70).abs() < 1e-12);
    }

    #[test]
    fn fallback_results_are_never_calibrated() {
        let mention = Mention::new("cerave cleanser B01N1LL62W");
        let mut result = MatchResult::fallback();
        calibrate(&mut result, &mention, &snapshot());
        assert_eq!(result.match_score, 0.1);
        assert!(!result.context_factors.brand_mentioned);
    }

    #[test]
    fn unknown_product_left_untouched() {
        let mention = Mention::new("cerave cleanser");
        let mut result = matched(0.80);
        result.product_id = "missing".into();
        calibrate(&mut result, &mention, &snapshot());
        assert_eq!(result.match_score, 0.80);
    }

    #[test]
    fn no_signals_means_no_change() {
        let mention = Mention::new("this thing is fine I guess");
        let mut result = matched(0.85);
        calibrate(&mut result, &mention, &snapshot());
        assert_eq!(result.match_score, 0.85);
        assert_eq!(result.context_factors, Default::default());
    }
}
