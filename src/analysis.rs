//! Sentiment, tag, and summary analysis.
//!
//! [`ContentAnalysis`] is the capability boundary: the pipeline only needs
//! `(label, confidence)`, a tag list, a summary, and an authenticity score.
//! [`KeywordAnalyzer`] is the built-in lexicon-based implementation; an
//! ML-backed analyzer can replace it behind the same trait.

use crate::atom::{SentimentLabel, Source};
use crate::matcher::contains_phrase;
use crate::mention::Feedback;

/// Analysis capability consumed by the synthesis pipeline.
pub trait ContentAnalysis: Send + Sync {
    /// Classify sentiment, returning the label and a confidence in [0, 1].
    fn sentiment(&self, text: &str) -> (SentimentLabel, f64);

    /// Extract category-relevant tags from the text.
    fn tags(&self, text: &str, category: &str) -> Vec<String>;

    /// Produce a short summary of the text.
    fn summarize(&self, text: &str) -> String;

    /// Estimate how authentic the feedback looks, in [0.1, 1.0].
    fn authenticity(&self, feedback: &Feedback) -> f64;
}

const POSITIVE_WORDS: &[&str] = &[
    "love",
    "great",
    "excellent",
    "amazing",
    "perfect",
    "recommend",
    "awesome",
    "fantastic",
    "wonderful",
    "best",
    "favorite",
    "worth",
];

const NEGATIVE_WORDS: &[&str] = &[
    "hate",
    "terrible",
    "awful",
    "disappointing",
    "waste",
    "avoid",
    "bad",
    "worst",
    "horrible",
    "useless",
    "regret",
    "return",
];

const NEUTRAL_WORDS: &[&str] = &["okay", "ok", "fine", "average", "decent", "alright", "so-so"];

const SKINCARE_TAGS: &[&str] = &[
    // skin types
    "oily",
    "dry",
    "combination",
    "sensitive",
    "acne-prone",
    // concerns
    "acne",
    "wrinkles",
    "redness",
    "dark spots",
    "blackheads",
    "pores",
    // ingredients
    "retinol",
    "vitamin c",
    "hyaluronic acid",
    "niacinamide",
    "salicylic acid",
    "benzoyl peroxide",
    "ceramides",
    "peptides",
    "aha",
    "bha",
];

const FOOD_TAGS: &[&str] = &[
    "sweet",
    "savory",
    "spicy",
    "bitter",
    "sour",
    "umami",
    "vegan",
    "gluten-free",
    "keto",
    "organic",
    "non-gmo",
    "paleo",
    "vegetarian",
    "crunchy",
    "smooth",
    "creamy",
    "crispy",
    "chewy",
    "soft",
];

const HOUSEHOLD_TAGS: &[&str] = &[
    "eco-friendly",
    "biodegradable",
    "reusable",
    "disposable",
    "concentrated",
    "stains",
    "odor",
    "germs",
    "bacteria",
    "allergens",
    "dust",
    "carpet",
    "wood",
    "glass",
    "tile",
    "fabric",
    "metal",
    "plastic",
];

const SUMMARY_MAX_WORDS: usize = 30;

/// Lexicon-driven analyzer. Deterministic and dependency-free, which keeps
/// batch processing fast and reproducible.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn lexicon(category: &str) -> &'static [&'static str] {
        match category {
            "skincare" => SKINCARE_TAGS,
            "food" => FOOD_TAGS,
            "household" => HOUSEHOLD_TAGS,
            _ => &[],
        }
    }
}

fn count_hits(text: &str, words: &[&str]) -> usize {
    words
        .iter()
        .filter(|word| contains_phrase(text, word))
        .count()
}

impl ContentAnalysis for KeywordAnalyzer {
    fn sentiment(&self, text: &str) -> (SentimentLabel, f64) {
        let lower = text.to_lowercase();
        let positive = count_hits(&lower, POSITIVE_WORDS);
        let negative = count_hits(&lower, NEGATIVE_WORDS);

        if positive > 0 && negative == 0 {
            let confidence = (0.5 + positive as f64 * 0.1).min(0.9);
            return (SentimentLabel::Positive, confidence);
        }
        if negative > 0 && positive == 0 {
            let confidence = (0.5 + negative as f64 * 0.1).min(0.9);
            return (SentimentLabel::Negative, confidence);
        }
        if positive > 0 && negative > 0 {
            let confidence = if positive == negative { 0.6 } else { 0.7 };
            return (SentimentLabel::Mixed, confidence);
        }
        if count_hits(&lower, NEUTRAL_WORDS) > 0 {
            return (SentimentLabel::Neutral, 0.7);
        }
        (SentimentLabel::Neutral, 0.5)
    }

    fn tags(&self, text: &str, category: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut tags: Vec<String> = Self::lexicon(category)
            .iter()
            .filter(|tag| contains_phrase(&lower, tag))
            .map(|tag| tag.to_string())
            .collect();
        if !category.is_empty() && !tags.iter().any(|t| t == category) {
            tags.push(category.to_string());
        }
        tags.sort();
        tags
    }

    fn summarize(&self, text: &str) -> String {
        let text = text.trim();
        if text.split_whitespace().count() <= SUMMARY_MAX_WORDS {
            return text.to_string();
        }

        // Lead-sentence extraction, dropping fragments of three words or
        // fewer, then packing whole sentences until the word budget runs out.
        let sentences: Vec<&str> = split_sentences(text)
            .into_iter()
            .filter(|s| s.split_whitespace().count() > 3)
            .collect();
        let Some(first) = sentences.first() else {
            return text.to_string();
        };

        let mut summary = (*first).to_string();
        let mut words = summary.split_whitespace().count();
        for sentence in &sentences[1..] {
            let next_words = sentence.split_whitespace().count();
            if words + next_words > SUMMARY_MAX_WORDS {
                continue;
            }
            summary.push_str(". ");
            summary.push_str(sentence);
            words += next_words;
        }
        summary
    }

    fn authenticity(&self, feedback: &Feedback) -> f64 {
        let mut score: f64 = 0.5;

        match feedback.source {
            Source::Reddit => {
                if feedback.score > 50 {
                    score += 0.2;
                } else if feedback.score > 10 {
                    score += 0.1;
                }
                if feedback.account_age_days.is_some_and(|days| days > 365) {
                    score += 0.1;
                }
            }
            Source::Youtube => {
                if feedback.score > 20 {
                    score += 0.2;
                } else if feedback.score > 5 {
                    score += 0.1;
                }
            }
            _ => {}
        }

        if feedback.verified_purchase == Some(true) {
            score += 0.2;
        }

        let word_count = feedback.text.split_whitespace().count();
        if word_count < 5 {
            score -= 0.1;
        } else if word_count > 30 {
            score += 0.1;
        }

        score.clamp(0.1, 1.0)
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split_terminator(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_confidence_scales_with_hits() {
        let analyzer = KeywordAnalyzer::new();
        let (label, confidence) = analyzer.sentiment("I love this, it works great");
        assert_eq!(label, SentimentLabel::Positive);
        assert!((confidence - 0.7).abs() < 1e-12);

        // Five distinct positive hits cap at 0.9.
        let (label, confidence) =
            analyzer.sentiment("love it, great texture, amazing value, perfect fit, the best");
        assert_eq!(label, SentimentLabel::Positive);
        assert!((confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn negative_and_neutral_paths() {
        let analyzer = KeywordAnalyzer::new();
        let (label, confidence) = analyzer.sentiment("terrible product, dried out my skin");
        assert_eq!(label, SentimentLabel::Negative);
        assert!((confidence - 0.6).abs() < 1e-12);

        assert_eq!(
            analyzer.sentiment("it's fine I suppose").0,
            SentimentLabel::Neutral
        );
        let (label, confidence) = analyzer.sentiment("this cleanser has a pump dispenser");
        assert_eq!(label, SentimentLabel::Neutral);
        assert!((confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn conflicting_signals_give_mixed() {
        let analyzer = KeywordAnalyzer::new();
        let (label, confidence) = analyzer.sentiment("great scent but terrible packaging");
        assert_eq!(label, SentimentLabel::Mixed);
        assert!((confidence - 0.6).abs() < 1e-12);

        let (label, confidence) = analyzer.sentiment("I love it, great stuff, but terrible cap");
        assert_eq!(label, SentimentLabel::Mixed);
        assert!((confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn keyword_match_respects_word_boundaries() {
        let analyzer = KeywordAnalyzer::new();
        // "lovely" must not count as "love", "broken" must not count as "ok".
        let (label, _) = analyzer.sentiment("the lovely box arrived broken");
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[test]
    fn tags_match_category_lexicon() {
        let analyzer = KeywordAnalyzer::new();
        let tags = analyzer.tags(
            "Works great on my oily skin, has ceramides and hyaluronic acid",
            "skincare",
        );
        assert_eq!(tags, vec!["ceramides", "hyaluronic acid", "oily", "skincare"]);

        assert_eq!(analyzer.tags("crunchy and sweet", "food"), vec![
            "crunchy", "food", "sweet"
        ]);
        // Unknown category still tags the category itself.
        assert_eq!(analyzer.tags("crunchy and sweet", "unknown"), vec![
            "unknown"
        ]);
    }

    #[test]
    fn short_text_summarizes_to_itself() {
        let analyzer = KeywordAnalyzer::new();
        let text = "Cleared my skin in two weeks.";
        assert_eq!(analyzer.summarize(text), text);
    }

    #[test]
    fn long_text_summary_leads_with_first_real_sentence() {
        let analyzer = KeywordAnalyzer::new();
        let text = "Wow. I have been using this foaming cleanser every morning for three \
                    months and my oily skin has never looked better or felt smoother. \
                    It foams up nicely and a little goes a long way so the bottle lasts. \
                    After washing my skin feels clean but never tight or dry at all.";
        let summary = analyzer.summarize(text);
        assert!(summary.starts_with("I have been using this foaming cleanser"));
        assert!(summary.split_whitespace().count() <= SUMMARY_MAX_WORDS);
    }

    #[test]
    fn authenticity_rewards_upvotes_and_length() {
        let analyzer = KeywordAnalyzer::new();

        let mut feedback = Feedback::new(
            "This cleanser cleared my skin within two weeks of daily use",
            Source::Reddit,
        );
        feedback.score = 60;
        // 0.5 base + 0.2 upvote tier.
        assert!((analyzer.authenticity(&feedback) - 0.7).abs() < 1e-12);

        let mut terse = Feedback::new("meh", Source::Forum);
        terse.score = 0;
        // 0.5 base - 0.1 short text.
        assert!((analyzer.authenticity(&terse) - 0.4).abs() < 1e-12);

        let mut verified = Feedback::new(
            "Bought this after my dermatologist recommended the brand to me",
            Source::Amazon,
        );
        verified.verified_purchase = Some(true);
        assert!((analyzer.authenticity(&verified) - 0.7).abs() < 1e-12);
    }
}
