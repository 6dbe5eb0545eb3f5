//! Stage 2: fuzzy brand/product similarity.
//!
//! Detects brand names in the mention first; when a brand is present the
//! candidate set narrows to that brand's products and their scores get a
//! fixed boost. Candidate scoring is normalized Levenshtein similarity
//! between the normalized mention and each canonical name: 1.0 for identical
//! strings, strictly decreasing with edit distance.

use std::collections::HashSet;

use strsim::normalized_levenshtein;

use crate::matcher::{
    ALTERNATIVE_POOL, AlternativeMatch, MatchMethod, MatchStrategy, StageMatch, contains_phrase,
};
use crate::mention::Mention;
use crate::normalize::normalize;
use crate::registry::RegistrySnapshot;

/// Multiplier applied to candidates of a detected brand, capped at 1.0.
pub const BRAND_BOOST: f64 = 1.2;

#[derive(Debug, Default)]
pub struct FuzzyBrandProductMatcher;

impl FuzzyBrandProductMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Brands present in the mention text, plus an upstream brand hint when
    /// it names a brand the registry knows.
    fn detect_brands(&self, mention: &Mention, snapshot: &RegistrySnapshot) -> HashSet<String> {
        let mut detected = HashSet::new();
        for brand in snapshot.brands() {
            if contains_phrase(&mention.normalized, &brand.normalized) {
                detected.insert(brand.normalized.clone());
            }
        }
        if let Some(hint) = &mention.hints.brand {
            let hinted = normalize(hint);
            if snapshot.brands().iter().any(|b| b.normalized == hinted) {
                detected.insert(hinted);
            }
        }
        detected
    }
}

impl MatchStrategy for FuzzyBrandProductMatcher {
    fn name(&self) -> &'static str {
        "fuzzy_brand_product"
    }

    fn method(&self) -> MatchMethod {
        MatchMethod::FuzzyBrandProduct
    }

    fn attempt(&self, mention: &Mention, snapshot: &RegistrySnapshot) -> Option<StageMatch> {
        let text = mention.normalized.as_str();
        if text.is_empty() || snapshot.is_empty() {
            return None;
        }

        let brands = self.detect_brands(mention, snapshot);

        let mut scored: Vec<(String, f64)> = snapshot
            .products()
            .filter(|p| brands.is_empty() || brands.contains(&normalize(&p.brand)))
            .map(|p| {
                let mut score = normalized_levenshtein(&normalize(&p.canonical_name), text);
                if !brands.is_empty() {
                    score = (score * BRAND_BOOST).min(1.0);
                }
                (p.product_id.clone(), score)
            })
            .collect();
        if scored.is_empty() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::MentionHints;
    use crate::registry::CanonicalProduct;

    fn product(id: &str, name: &str, brand: &str) -> CanonicalProduct {
        CanonicalProduct {
            product_id: id.into(),
            canonical_name: name.into(),
            brand: brand.into(),
            category: "skincare".into(),
            product_type: "cleanser".into(),
            aliases: vec![],
            identifiers: Default::default(),
            status: "active".into(),
            verification_sources: vec![],
        }
    }

    fn snapshot() -> RegistrySnapshot {
        RegistrySnapshot::from_products(vec![
            product(
                "cerave_foaming_cleanser_12oz",
                "CeraVe Foaming Facial Cleanser",
                "CeraVe",
            ),
            product(
                "neutrogena_hydro_boost",
                "Neutrogena Hydro Boost Water Gel",
                "Neutrogena",
            ),
        ])
    }

    #[test]
    fn identical_canonical_text_scores_one() {
        let snap = RegistrySnapshot::from_products(vec![product("p", "Plain Cleanser", "")]);
        let hit = FuzzyBrandProductMatcher::new()
            .attempt(&Mention::new("Plain Cleanser"), &snap)
            .unwrap();
        assert_eq!(hit.product_id, "p");
        assert!((hit.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn brand_detection_narrows_and_boosts() {
        let snap = snapshot();
        let hit = FuzzyBrandProductMatcher::new()
            .attempt(&Mention::new("cerave foaming face cleanser"), &snap)
            .unwrap();
        assert_eq!(hit.product_id, "cerave_foaming_cleanser_12oz");
        assert!(hit.score > 0.8, "boosted near-identical name: {}", hit.score);
        // Brand narrowing drops the other brand's product entirely.
        assert!(
            hit.alternatives
                .iter()
                .all(|a| a.product_id != "neutrogena_hydro_boost")
        );
    }

    #[test]
    fn boost_never_exceeds_one() {
        let snap = snapshot();
        let hit = FuzzyBrandProductMatcher::new()
            .attempt(&Mention::new("CeraVe Foaming Facial Cleanser"), &snap)
            .unwrap();
        assert!(hit.score <= 1.0);
        assert!((hit.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn without_brand_all_products_are_candidates() {
        let snap = snapshot();
        let hit = FuzzyBrandProductMatcher::new()
            .attempt(&Mention::new("hydro boost water gel"), &snap)
            .unwrap();
        assert_eq!(hit.product_id, "neutrogena_hydro_boost");
        assert_eq!(hit.alternatives.len(), 1);
    }

    #[test]
    fn brand_hint_counts_as_detection() {
        let snap = snapshot();
        let mention = Mention::with_hints(
            "foaming face cleanser",
            MentionHints {
                brand: Some("CeraVe".into()),
                ..Default::default()
            },
        );
        let unhinted = FuzzyBrandProductMatcher::new()
            .attempt(&Mention::new("foaming face cleanser"), &snap)
            .unwrap();
        let hinted = FuzzyBrandProductMatcher::new()
            .attempt(&mention, &snap)
            .unwrap();
        assert_eq!(hinted.product_id, "cerave_foaming_cleanser_12oz");
        assert!(hinted.score > unhinted.score);
    }

    #[test]
    fn empty_registry_yields_none() {
        let snap = RegistrySnapshot::from_products(vec![]);
        assert!(
            FuzzyBrandProductMatcher::new()
                .attempt(&Mention::new("anything"), &snap)
                .is_none()
        );
    }

    #[test]
    fn similarity_decreases_with_edit_distance() {
        let close = normalized_levenshtein("cerave foaming cleanser", "cerave foaming cleansers");
        let far = normalized_levenshtein("cerave foaming cleanser", "neutrogena water gel");
        assert!(close > far);
        assert!(close < 1.0);
    }
}
