//! Ego-network aggregation: per-product trust context served from a cache.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::atom::{SentimentLabel, Source};
use crate::config::AggregationConfig;

use super::{EdgeKind, NodeKey, TrustGraph};

/// Per-label share of atoms. All zero when no atoms exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SentimentDistribution {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub mixed: f64,
}

/// One tag with its occurrence count across the ego-network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Aggregated view of all trust atoms in a product's ego-network.
#[derive(Debug, Clone, Serialize)]
pub struct TrustContext {
    pub product_id: String,
    pub total_atoms: usize,
    /// `(positive − negative) / total`, or 0 with no atoms.
    pub trust_score: f64,
    pub sentiment_distribution: SentimentDistribution,
    /// Frequency-descending, ties alphabetical, truncated to the configured
    /// top-N.
    pub top_tags: Vec<TagCount>,
    /// Distinct sources observed, in stable order.
    pub sources: Vec<Source>,
    pub max_hops: usize,
    pub generated_at: DateTime<Utc>,
}

impl TrustContext {
    /// The well-defined answer for a product nobody has talked about.
    fn neutral(product_id: &str, max_hops: usize) -> Self {
        Self {
            product_id: product_id.to_string(),
            total_atoms: 0,
            trust_score: 0.0,
            sentiment_distribution: SentimentDistribution::default(),
            top_tags: Vec::new(),
            sources: Vec::new(),
            max_hops,
            generated_at: Utc::now(),
        }
    }
}

pub(crate) struct CachedContext {
    params: AggregationConfig,
    context: Arc<TrustContext>,
}

impl TrustGraph {
    /// Aggregate the product's ego-network within `config.max_hops`.
    ///
    /// Results are cached per product and invalidated when an atom for that
    /// product is ingested. A product with no atoms yields the neutral
    /// context rather than an error.
    pub fn product_trust_context(
        &self,
        product_id: &str,
        config: &AggregationConfig,
    ) -> Arc<TrustContext> {
        if let Some(cached) = self.context_cache.get(product_id) {
            if cached.params == *config {
                return Arc::clone(&cached.context);
            }
        }

        let context = Arc::new(self.compute_context(product_id, config));
        self.context_cache.insert(
            product_id.to_string(),
            CachedContext {
                params: config.clone(),
                context: Arc::clone(&context),
            },
        );
        tracing::debug!(
            product_id,
            atoms = context.total_atoms,
            trust_score = context.trust_score,
            "trust context computed"
        );
        context
    }

    fn compute_context(&self, product_id: &str, config: &AggregationConfig) -> TrustContext {
        let graph = self.graph.read().expect("graph lock poisoned");
        let start = match self
            .node_index
            .get(&NodeKey::Product(product_id.to_string()))
        {
            Some(idx) => *idx.value(),
            None => return TrustContext::neutral(product_id, config.max_hops),
        };

        // BFS out from the product node, collecting atom nodes inside the
        // hop budget. Atom attributes (sentiment, tags, source) are read off
        // each collected atom afterwards; max_hops bounds collection, not
        // attribute reads.
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        let mut atom_nodes: Vec<NodeIndex> = Vec::new();
        visited.insert(start);
        queue.push_back((start, 0));

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= config.max_hops {
                continue;
            }
            for edge in graph.edges_directed(node, Direction::Outgoing) {
                let target = edge.target();
                if visited.insert(target) {
                    if matches!(graph[target], NodeKey::Atom(_)) {
                        atom_nodes.push(target);
                    }
                    queue.push_back((target, depth + 1));
                }
            }
        }

        let total = atom_nodes.len();
        if total == 0 {
            return TrustContext::neutral(product_id, config.max_hops);
        }

        let mut positive = 0usize;
        let mut negative = 0usize;
        let mut neutral = 0usize;
        let mut mixed = 0usize;
        let mut tag_counts: HashMap<&str, usize> = HashMap::new();
        let mut seen_sources: HashSet<Source> = HashSet::new();

        for &atom_node in &atom_nodes {
            for edge in graph.edges_directed(atom_node, Direction::Outgoing) {
                match (edge.weight().kind, &graph[edge.target()]) {
                    (EdgeKind::HasSentiment, NodeKey::Sentiment(label)) => match label {
                        SentimentLabel::Positive => positive += 1,
                        SentimentLabel::Negative => negative += 1,
                        SentimentLabel::Neutral => neutral += 1,
                        SentimentLabel::Mixed => mixed += 1,
                    },
                    (EdgeKind::HasTag, NodeKey::Tag(tag)) => {
                        *tag_counts.entry(tag.as_str()).or_default() += 1;
                    }
                    (EdgeKind::FromSource, NodeKey::Source(source)) => {
                        seen_sources.insert(*source);
                    }
                    _ => {}
                }
            }
        }

        let denominator = total as f64;
        let trust_score = (positive as f64 - negative as f64) / denominator;

        let mut top_tags: Vec<TagCount> = tag_counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect();
        top_tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        top_tags.truncate(config.top_tags);

        let mut sources: Vec<Source> = seen_sources.into_iter().collect();
        sources.sort_by_key(Source::as_str);

        TrustContext {
            product_id: product_id.to_string(),
            total_atoms: total,
            trust_score,
            sentiment_distribution: SentimentDistribution {
                positive: positive as f64 / denominator,
                negative: negative as f64 / denominator,
                neutral: neutral as f64 / denominator,
                mixed: mixed as f64 / denominator,
            },
            top_tags,
            sources,
            max_hops: config.max_hops,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{atom, product};

    fn config() -> AggregationConfig {
        AggregationConfig::default()
    }

    #[test]
    fn trust_score_from_mixed_feedback() {
        let graph = TrustGraph::new();
        let p = product("p1");
        for (id, label) in [
            ("a1", SentimentLabel::Positive),
            ("a2", SentimentLabel::Positive),
            ("a3", SentimentLabel::Positive),
            ("a4", SentimentLabel::Negative),
            ("a5", SentimentLabel::Neutral),
        ] {
            graph.ingest(&atom(id, "p1", label), Some(&p)).unwrap();
        }

        let context = graph.product_trust_context("p1", &config());
        assert_eq!(context.total_atoms, 5);
        // (3 - 1) / 5
        assert!((context.trust_score - 0.4).abs() < 1e-12);
        assert!((context.sentiment_distribution.positive - 0.6).abs() < 1e-12);
        assert!((context.sentiment_distribution.negative - 0.2).abs() < 1e-12);
        assert!((context.sentiment_distribution.neutral - 0.2).abs() < 1e-12);
        assert_eq!(context.sentiment_distribution.mixed, 0.0);
        assert_eq!(context.sources, vec![Source::Reddit]);
    }

    #[test]
    fn unknown_product_yields_neutral_context() {
        let graph = TrustGraph::new();
        let context = graph.product_trust_context("nobody_mentioned_me", &config());
        assert_eq!(context.total_atoms, 0);
        assert_eq!(context.trust_score, 0.0);
        assert_eq!(context.sentiment_distribution, SentimentDistribution::default());
        assert!(context.top_tags.is_empty());
        assert!(context.sources.is_empty());
    }

    #[test]
    fn top_tags_rank_by_count_then_name() {
        let graph = TrustGraph::new();
        let p = product("p1");
        let mut a1 = atom("a1", "p1", SentimentLabel::Positive);
        a1.tags = vec!["oily".into(), "acne".into()];
        let mut a2 = atom("a2", "p1", SentimentLabel::Positive);
        a2.tags = vec!["oily".into(), "acne".into()];
        let mut a3 = atom("a3", "p1", SentimentLabel::Positive);
        a3.tags = vec!["oily".into(), "acne".into(), "dry".into()];
        for a in [&a1, &a2, &a3] {
            graph.ingest(a, Some(&p)).unwrap();
        }

        let params = AggregationConfig {
            top_tags: 2,
            ..AggregationConfig::default()
        };
        let context = graph.product_trust_context("p1", &params);
        assert_eq!(context.top_tags, vec![
            TagCount {
                tag: "acne".into(),
                count: 3
            },
            TagCount {
                tag: "oily".into(),
                count: 3
            },
        ]);
    }

    #[test]
    fn cache_serves_repeat_queries_and_ingest_invalidates() {
        let graph = TrustGraph::new();
        let p = product("p1");
        graph
            .ingest(&atom("a1", "p1", SentimentLabel::Positive), Some(&p))
            .unwrap();

        let first = graph.product_trust_context("p1", &config());
        let second = graph.product_trust_context("p1", &config());
        assert!(Arc::ptr_eq(&first, &second));

        graph
            .ingest(&atom("a2", "p1", SentimentLabel::Negative), Some(&p))
            .unwrap();
        let third = graph.product_trust_context("p1", &config());
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third.total_atoms, 2);
        assert_eq!(third.trust_score, 0.0);
    }

    #[test]
    fn hop_budget_bounds_atom_collection() {
        let graph = TrustGraph::new();
        let p = product("p1");
        graph
            .ingest(&atom("a1", "p1", SentimentLabel::Positive), Some(&p))
            .unwrap();

        let zero_hops = AggregationConfig {
            max_hops: 0,
            ..AggregationConfig::default()
        };
        let context = graph.product_trust_context("p1", &zero_hops);
        assert_eq!(context.total_atoms, 0);
        assert_eq!(context.trust_score, 0.0);
    }
}
