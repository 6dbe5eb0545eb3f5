// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # trustgraph
//!
//! Entity resolution and trust aggregation for consumer product mentions.
//! Feedback text from collectors (reddit, youtube, amazon, forums) is matched
//! against a canonical product registry, synthesized into trust atoms, and
//! aggregated into per-product trust contexts over a knowledge graph.
//!
//! ## Architecture
//!
//! - **Normalization** (`normalize`): pure text canonicalization shared by the
//!   registry index and every matcher
//! - **Registry** (`registry`): validated product snapshots behind an
//!   atomically swappable handle
//! - **Matching** (`matcher`): exact / fuzzy / semantic cascade with
//!   per-stage acceptance thresholds and confidence calibration
//! - **Analysis** (`analysis`): sentiment, tags, summary, and authenticity
//!   behind a replaceable trait
//! - **Synthesis** (`synthesize`): feedback + match + analysis folded into
//!   schema-complete trust atoms
//! - **Graph** (`graph`): petgraph-backed trust graph with cached ego-network
//!   aggregation
//! - **Storage** (`storage`): append-only atom store the graph is a derived
//!   view of
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use trustgraph::atom::Source;
//! use trustgraph::config::EngineConfig;
//! use trustgraph::mention::Feedback;
//! use trustgraph::pipeline::Pipeline;
//! use trustgraph::registry::{RegistrySnapshot, SharedRegistry};
//!
//! let (snapshot, _report) = RegistrySnapshot::load_file("registry.json".as_ref()).unwrap();
//! let registry = Arc::new(SharedRegistry::new(snapshot));
//! let pipeline = Pipeline::from_config(EngineConfig::default(), registry).unwrap();
//!
//! pipeline
//!     .process_feedback(&Feedback::new("I love my CeraVe cleanser", Source::Reddit))
//!     .unwrap();
//! let context = pipeline.trust_context("cerave_foaming_cleanser_12oz");
//! println!("trust score: {}", context.trust_score);
//! ```

pub mod analysis;
pub mod atom;
pub mod config;
pub mod embed;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod mention;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod storage;
pub mod suggestions;
pub mod synthesize;
