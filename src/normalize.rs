//! Pure text canonicalization for mention matching.
//!
//! `normalize` produces the form all matchers and the alias index operate on:
//! NFKC-folded, lowercased, URL- and punctuation-stripped (internal apostrophes
//! survive), whitespace-collapsed, stopwords removed. The same function is
//! applied to registry aliases and to mention text, so containment and
//! similarity always compare like with like.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static RE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Fixed stopword set, sorted for binary search.
///
/// No negations here; sentiment keywords must survive normalization.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had", "has",
    "have", "he", "her", "his", "i", "in", "is", "it", "its", "me", "my", "of", "on", "or", "our",
    "she", "that", "the", "their", "them", "these", "they", "this", "those", "to", "was", "we",
    "were", "with", "you", "your",
];

/// Canonicalize text for matching. Pure and deterministic.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let folded: String = text
        .nfkc()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();
    let lowered = folded.to_lowercase();

    let without_urls = RE_URL.replace_all(&lowered, "");
    let stripped = strip_punctuation(&without_urls);
    let collapsed = RE_WS.replace_all(stripped.trim(), " ");

    collapsed
        .split(' ')
        .filter(|word| !word.is_empty() && !is_stopword(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when `word` is in the fixed stopword set.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Replace punctuation with spaces, keeping apostrophes that sit between
/// alphanumeric characters ("don't" stays intact, quoting marks go).
fn strip_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
            out.push(c);
        } else if c == '\'' {
            let prev_ok = i > 0 && chars[i - 1].is_alphanumeric();
            let next_ok = chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
            if prev_ok && next_ok {
                out.push(c);
            } else {
                out.push(' ');
            }
        } else {
            out.push(' ');
        }
    }
    out
}
