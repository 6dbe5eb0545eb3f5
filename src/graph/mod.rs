//! Trust graph: a derived, rebuildable view over the atom stream.
//!
//! Nodes are products, atoms, tags, sources, sentiment labels, brands, and
//! categories; edges record what each atom asserted. The stored atom stream
//! stays the system of record; replaying it through [`TrustGraph::ingest`]
//! reproduces the same graph, because ingesting an already-seen `atom_id`
//! is a no-op.

pub mod aggregate;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::atom::{SentimentLabel, Source, TrustAtom};
use crate::error::GraphError;
use crate::registry::CanonicalProduct;

pub use aggregate::{SentimentDistribution, TagCount, TrustContext};

/// Identity of a graph node. One node exists per distinct key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Product(String),
    Atom(String),
    Tag(String),
    Source(Source),
    Sentiment(SentimentLabel),
    Brand(String),
    Category(String),
}

/// Relation types carried on edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// product → atom
    HasFeedback,
    /// atom → sentiment
    HasSentiment,
    /// atom → tag
    HasTag,
    /// atom → source
    FromSource,
    /// product → brand
    HasBrand,
    /// product → category
    HasCategory,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::HasFeedback => "has_feedback",
            EdgeKind::HasSentiment => "has_sentiment",
            EdgeKind::HasTag => "has_tag",
            EdgeKind::FromSource => "from_source",
            EdgeKind::HasBrand => "has_brand",
            EdgeKind::HasCategory => "has_category",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge payload: the relation, the asserting atom, and its confidence.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub kind: EdgeKind,
    pub atom_id: String,
    pub confidence: f64,
}

/// Audit record for an atom dropped at the graph boundary.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub atom_id: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Concurrent trust graph.
///
/// All edges of one atom become visible in a single write-lock section, so
/// readers either see the whole atom or none of it. Node lookups go through
/// a `DashMap` side index.
pub struct TrustGraph {
    graph: RwLock<DiGraph<NodeKey, EdgeData>>,
    node_index: DashMap<NodeKey, NodeIndex>,
    /// Atom ids already ingested. Claimed before building edges, which makes
    /// concurrent double-ingest of one atom a no-op for the loser.
    ingested: DashMap<String, ()>,
    atom_count: AtomicUsize,
    audit: Mutex<Vec<AuditEntry>>,
    context_cache: DashMap<String, aggregate::CachedContext>,
}

impl TrustGraph {
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            ingested: DashMap::new(),
            atom_count: AtomicUsize::new(0),
            audit: Mutex::new(Vec::new()),
            context_cache: DashMap::new(),
        }
    }

    /// Ingest one atom, creating missing nodes and edges.
    ///
    /// Returns `Ok(true)` when the atom was added, `Ok(false)` when its
    /// `atom_id` was already present. A schema-invalid atom is rejected
    /// before any node is touched and leaves an audit entry.
    pub fn ingest(
        &self,
        atom: &TrustAtom,
        product: Option<&CanonicalProduct>,
    ) -> Result<bool, GraphError> {
        if let Err(source) = atom.validate() {
            self.record_rejection(&atom.atom_id, &source.to_string());
            return Err(GraphError::Rejected {
                atom_id: atom.atom_id.clone(),
                source,
            });
        }

        if self.ingested.insert(atom.atom_id.clone(), ()).is_some() {
            tracing::trace!(atom_id = %atom.atom_id, "atom already in graph");
            return Ok(false);
        }

        {
            let mut graph = self.graph.write().expect("graph lock poisoned");

            let product_node =
                self.ensure_node(&mut graph, NodeKey::Product(atom.product_id.clone()));
            let atom_node = self.ensure_node(&mut graph, NodeKey::Atom(atom.atom_id.clone()));
            let sentiment_node =
                self.ensure_node(&mut graph, NodeKey::Sentiment(atom.sentiment_label));
            let source_node = self.ensure_node(&mut graph, NodeKey::Source(atom.source));

            self.link(
                &mut graph,
                product_node,
                atom_node,
                EdgeKind::HasFeedback,
                atom,
            );
            self.link(
                &mut graph,
                atom_node,
                sentiment_node,
                EdgeKind::HasSentiment,
                atom,
            );
            self.link(&mut graph, atom_node, source_node, EdgeKind::FromSource, atom);

            for tag in &atom.tags {
                let tag_node = self.ensure_node(&mut graph, NodeKey::Tag(tag.clone()));
                self.link(&mut graph, atom_node, tag_node, EdgeKind::HasTag, atom);
            }

            if let Some(product) = product {
                if !product.brand.is_empty() {
                    let brand_node =
                        self.ensure_node(&mut graph, NodeKey::Brand(product.brand.clone()));
                    self.link(&mut graph, product_node, brand_node, EdgeKind::HasBrand, atom);
                }
                if !product.category.is_empty() {
                    let category_node =
                        self.ensure_node(&mut graph, NodeKey::Category(product.category.clone()));
                    self.link(
                        &mut graph,
                        product_node,
                        category_node,
                        EdgeKind::HasCategory,
                        atom,
                    );
                }
            }
        }

        self.atom_count.fetch_add(1, Ordering::Relaxed);
        self.context_cache.remove(&atom.product_id);
        tracing::debug!(atom_id = %atom.atom_id, product_id = %atom.product_id, "atom ingested");
        Ok(true)
    }

    fn ensure_node(&self, graph: &mut DiGraph<NodeKey, EdgeData>, key: NodeKey) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&key) {
            return *idx.value();
        }
        let idx = graph.add_node(key.clone());
        self.node_index.insert(key, idx);
        idx
    }

    /// Add an edge unless the `(from, to, kind)` triple already exists.
    fn link(
        &self,
        graph: &mut DiGraph<NodeKey, EdgeData>,
        from: NodeIndex,
        to: NodeIndex,
        kind: EdgeKind,
        atom: &TrustAtom,
    ) {
        let exists = graph
            .edges_connecting(from, to)
            .any(|edge| edge.weight().kind == kind);
        if !exists {
            graph.add_edge(
                from,
                to,
                EdgeData {
                    kind,
                    atom_id: atom.atom_id.clone(),
                    confidence: atom.confidence_score,
                },
            );
        }
    }

    fn record_rejection(&self, atom_id: &str, reason: &str) {
        tracing::warn!(atom_id, reason, "atom rejected at graph boundary");
        self.audit
            .lock()
            .expect("audit lock poisoned")
            .push(AuditEntry {
                atom_id: atom_id.to_string(),
                reason: reason.to_string(),
                at: Utc::now(),
            });
    }

    /// Audit entries for rejected atoms, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().expect("audit lock poisoned").clone()
    }

    pub fn contains_atom(&self, atom_id: &str) -> bool {
        self.ingested.contains_key(atom_id)
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count.load(Ordering::Relaxed)
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").edge_count()
    }

    /// Number of edges carrying a given relation.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> usize {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_weights()
            .filter(|edge| edge.kind == kind)
            .count()
    }
}

impl Default for TrustGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrustGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustGraph")
            .field("nodes", &self.node_count())
            .field("atoms", &self.atom_count())
            .finish()
    }
}
