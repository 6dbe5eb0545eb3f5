//! Embedding capability for the semantic match stage.
//!
//! The engine only ever talks to the [`Embedder`] trait: `embed(text)` with a
//! bounded-latency guarantee. Two providers ship here. [`HashEmbedder`] is a
//! deterministic feature-hashing encoder that needs no service at all;
//! [`HttpEmbedder`] calls any endpoint speaking the simple JSON contract
//! `{"text": ...}` → `{"embedding": [...]}`. [`DeadlineEmbedder`] wraps any
//! provider with a hard timeout so a stalled call degrades the semantic stage
//! instead of the whole match.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use rayon::prelude::*;

use crate::error::EmbedError;
use crate::normalize::normalize;
use crate::registry::{CanonicalProduct, RegistrySnapshot};

/// Text-to-vector capability with bounded latency.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Expected output dimension, when the provider knows it up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Cosine similarity; `None` when dimensions differ or a vector is all-zero.
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

// ---------------------------------------------------------------------------
// Deterministic feature-hashing provider
// ---------------------------------------------------------------------------

/// Feature-hashing bag-of-words encoder. Same text, same vector, no service.
///
/// Words and adjacent word pairs are hashed into a fixed-dimension signed
/// vector, then L2-normalized. Crude next to a learned model, but enough for
/// the semantic stage to rank near-paraphrases, and it never times out.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn slot(&self, token: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let index = (h % self.dimension as u64) as usize;
        let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut vector = vec![0.0f32; self.dimension];
        let words: Vec<&str> = normalized.split(' ').collect();
        for word in &words {
            let (index, sign) = self.slot(word);
            vector[index] += sign;
        }
        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let (index, sign) = self.slot(&bigram);
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

/// Client for an external embedding service.
pub struct HttpEmbedder {
    url: String,
    timeout: Duration,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    /// Lightweight availability check: embed a one-word probe.
    pub fn probe(&self) -> bool {
        self.embed("probe").is_ok()
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let body = serde_json::json!({ "text": text });
        let body_str = serde_json::to_string(&body).map_err(|e| EmbedError::BadResponse {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| EmbedError::ServiceUnavailable {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| EmbedError::BadResponse {
            message: e.to_string(),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| EmbedError::BadResponse {
                message: e.to_string(),
            })?;

        let values = json["embedding"]
            .as_array()
            .ok_or_else(|| EmbedError::BadResponse {
                message: "missing 'embedding' array".into(),
            })?;
        let mut vector = Vec::with_capacity(values.len());
        for value in values {
            let f = value.as_f64().ok_or_else(|| EmbedError::BadResponse {
                message: "non-numeric embedding component".into(),
            })?;
            vector.push(f as f32);
        }
        if vector.is_empty() {
            return Err(EmbedError::BadResponse {
                message: "empty embedding".into(),
            });
        }
        Ok(vector)
    }
}

// ---------------------------------------------------------------------------
// Deadline wrapper
// ---------------------------------------------------------------------------

/// Enforces a hard deadline on any provider. On timeout the worker thread is
/// left to finish and its result is dropped; at most one embed call is in
/// flight per mention, which bounds the leak.
pub struct DeadlineEmbedder<E> {
    inner: Arc<E>,
    deadline: Duration,
}

impl<E> DeadlineEmbedder<E> {
    pub fn new(inner: E, deadline: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            deadline,
        }
    }
}

impl<E: Embedder + 'static> Embedder for DeadlineEmbedder<E> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = text.to_string();
        std::thread::spawn(move || {
            let _ = tx.send(inner.embed(&owned));
        });
        match rx.recv_timeout(self.deadline) {
            Ok(result) => result,
            Err(_) => Err(EmbedError::Timeout {
                waited_ms: self.deadline.as_millis() as u64,
            }),
        }
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }
}

// ---------------------------------------------------------------------------
// Precomputed product vectors
// ---------------------------------------------------------------------------

/// Embeddings for every product in a snapshot, built once per registry load.
pub struct ProductEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl ProductEmbeddings {
    /// Embed each product's identity text in parallel.
    ///
    /// Fails fast if the provider cannot embed any product; the caller then
    /// runs without a semantic stage rather than with a partial index.
    pub fn build(
        snapshot: &RegistrySnapshot,
        embedder: &dyn Embedder,
    ) -> Result<Self, EmbedError> {
        let products: Vec<&CanonicalProduct> = snapshot.products().collect();
        let pairs: Vec<(String, Vec<f32>)> = products
            .par_iter()
            .map(|p| {
                embedder
                    .embed(&identity_text(p))
                    .map(|v| (p.product_id.clone(), v))
            })
            .collect::<Result<_, _>>()?;

        let dimension = pairs.first().map_or(0, |(_, v)| v.len());
        for (id, vector) in &pairs {
            if vector.len() != dimension {
                tracing::warn!(product_id = %id, "inconsistent embedding dimension");
                return Err(EmbedError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
        }

        Ok(Self {
            vectors: pairs.into_iter().collect(),
            dimension,
        })
    }

    pub fn get(&self, product_id: &str) -> Option<&[f32]> {
        self.vectors.get(product_id).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.vectors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// The text a product is embedded under: name, brand, type, and aliases.
fn identity_text(product: &CanonicalProduct) -> String {
    let mut parts = vec![
        product.canonical_name.clone(),
        product.brand.clone(),
        product.product_type.clone(),
    ];
    parts.extend(product.aliases.iter().cloned());
    parts.retain(|p| !p.trim().is_empty());
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("cerave foaming cleanser").unwrap();
        let b = embedder.embed("cerave foaming cleanser").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_embedder_rejects_blank_text() {
        let embedder = HashEmbedder::new(64);
        assert!(matches!(
            embedder.embed("   "),
            Err(EmbedError::EmptyInput)
        ));
    }

    #[test]
    fn similar_texts_score_above_unrelated() {
        let embedder = HashEmbedder::new(256);
        let cleanser = embedder.embed("cerave foaming facial cleanser").unwrap();
        let near = embedder.embed("the cerave foaming cleanser").unwrap();
        let far = embedder.embed("mechanical keyboard with brown switches").unwrap();

        let near_score = cosine(&cleanser, &near).unwrap();
        let far_score = cosine(&cleanser, &far).unwrap();
        assert!(near_score > far_score);
        assert!(near_score > 0.5, "shared tokens dominate: {near_score}");
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert!(cosine(&[1.0, 0.0], &[1.0]).is_none());
        assert!(cosine(&[0.0, 0.0], &[1.0, 1.0]).is_none());
        assert!(cosine(&[], &[]).is_none());
        let same = cosine(&[0.5, 0.5], &[0.5, 0.5]).unwrap();
        assert!((same - 1.0).abs() < 1e-9);
    }

    struct SlowEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for SlowEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            Ok(vec![1.0])
        }
    }

    #[test]
    fn deadline_embedder_times_out() {
        let embedder = DeadlineEmbedder::new(
            SlowEmbedder {
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(20),
        );
        match embedder.embed("anything") {
            Err(EmbedError::Timeout { waited_ms }) => assert_eq!(waited_ms, 20),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn deadline_embedder_passes_fast_results_through() {
        let embedder = DeadlineEmbedder::new(HashEmbedder::new(32), Duration::from_secs(5));
        let vector = embedder.embed("quick one").unwrap();
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn product_embeddings_cover_snapshot() {
        use crate::registry::RegistrySnapshot;

        let products = vec![
            CanonicalProduct {
                product_id: "a".into(),
                canonical_name: "Product A".into(),
                brand: "Brand".into(),
                category: String::new(),
                product_type: "cleanser".into(),
                aliases: vec!["the a".into()],
                identifiers: Default::default(),
                status: "active".into(),
                verification_sources: vec![],
            },
            CanonicalProduct {
                product_id: "b".into(),
                canonical_name: "Product B".into(),
                brand: "Brand".into(),
                category: String::new(),
                product_type: "serum".into(),
                aliases: vec![],
                identifiers: Default::default(),
                status: "active".into(),
                verification_sources: vec![],
            },
        ];
        let snapshot = RegistrySnapshot::from_products(products);
        let embeddings = ProductEmbeddings::build(&snapshot, &HashEmbedder::new(64)).unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings.dimension(), 64);
        assert!(embeddings.get("a").is_some());
        assert!(embeddings.get("missing").is_none());
    }
}
