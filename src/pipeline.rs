//! Pipeline facade: feedback in, trust atoms and aggregates out.
//!
//! The `Pipeline` owns the arbiter, analyzer, synthesizer, store, and graph,
//! and wires them in the fixed order: normalize, resolve, calibrate, analyze,
//! synthesize, persist, ingest. Batches run the same path per record in
//! parallel; one record's failure never aborts the rest.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::{ContentAnalysis, KeywordAnalyzer};
use crate::atom::TrustAtom;
use crate::config::{EmbedConfig, EngineConfig};
use crate::embed::{DeadlineEmbedder, Embedder, HashEmbedder, HttpEmbedder, ProductEmbeddings};
use crate::error::TrustError;
use crate::graph::{TrustContext, TrustGraph};
use crate::matcher::{MatchArbiter, MatchMethod, MatchResult, MatchStats, SemanticMatcher, calibrate};
use crate::mention::{Feedback, Mention};
use crate::registry::SharedRegistry;
use crate::storage::{AtomFilter, AtomStore, MemoryStore};
use crate::suggestions::SuggestionLog;
use crate::synthesize::{Analysis, AtomSynthesizer};

/// Cooperative cancellation flag for batch runs.
///
/// Checked between records only, so a cancelled batch never leaves a
/// half-committed atom behind.
#[derive(Debug, Default)]
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What happened to one feedback record.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Synthesized, persisted, and ingested.
    Atom(TrustAtom),
    /// Nothing usable survived normalization; no atom, no suggestion entry.
    Skipped,
    /// The synthesized atom failed schema validation and was dropped with an
    /// audit entry.
    Dropped,
}

/// Accounting for one batch run. Every input lands in exactly one bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    /// Accepted matches per resolution method, fallbacks excluded.
    pub matched_by_stage: HashMap<MatchMethod, usize>,
    pub fallback: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub errors: usize,
    /// Inputs never processed because the batch was cancelled.
    pub cancelled: usize,
}

impl BatchReport {
    pub fn atoms(&self) -> usize {
        self.matched_by_stage.values().sum::<usize>() + self.fallback
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "processed {} feedback records", self.total)?;
        let mut methods: Vec<_> = self.matched_by_stage.iter().collect();
        methods.sort_by_key(|(method, _)| method.to_string());
        for (method, count) in methods {
            writeln!(f, "  {method}: {count}")?;
        }
        writeln!(f, "  fallback: {}", self.fallback)?;
        writeln!(f, "  skipped: {}", self.skipped)?;
        if self.dropped > 0 {
            writeln!(f, "  dropped: {}", self.dropped)?;
        }
        if self.errors > 0 {
            writeln!(f, "  errors: {}", self.errors)?;
        }
        if self.cancelled > 0 {
            writeln!(f, "  cancelled: {}", self.cancelled)?;
        }
        Ok(())
    }
}

/// Counts from replaying the store into the graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayStats {
    pub admitted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// The end-to-end processing pipeline.
///
/// Owns every subsystem between collector output and aggregation queries.
pub struct Pipeline {
    registry: Arc<SharedRegistry>,
    arbiter: MatchArbiter,
    analyzer: Box<dyn ContentAnalysis>,
    synthesizer: AtomSynthesizer,
    store: Arc<dyn AtomStore>,
    graph: Arc<TrustGraph>,
    config: EngineConfig,
}

impl Pipeline {
    /// Assemble a pipeline from configuration.
    ///
    /// The semantic stage is installed only when an embed provider is
    /// configured and its product index builds cleanly; otherwise matching
    /// runs on the exact and fuzzy stages alone.
    pub fn from_config(
        config: EngineConfig,
        registry: Arc<SharedRegistry>,
    ) -> Result<Self, TrustError> {
        config.validate()?;

        let suggestions = match &config.suggestion_log {
            Some(path) => Arc::new(SuggestionLog::with_file(path)?),
            None => Arc::new(SuggestionLog::new()),
        };

        let mut arbiter = MatchArbiter::new(&config.matching, suggestions);
        if let Some(embedder) = build_embedder(&config.embed) {
            let snapshot = registry.snapshot();
            match ProductEmbeddings::build(&snapshot, embedder.as_ref()) {
                Ok(embeddings) => {
                    tracing::info!(
                        products = embeddings.len(),
                        dimension = embeddings.dimension(),
                        "semantic stage enabled"
                    );
                    arbiter = arbiter.with_semantic(
                        SemanticMatcher::new(embedder, Arc::new(embeddings)),
                        config.matching.semantic_accept,
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "semantic stage disabled, embedding index failed");
                }
            }
        }

        tracing::info!(
            products = registry.snapshot().len(),
            "pipeline initialized"
        );

        Ok(Self {
            registry,
            arbiter,
            analyzer: Box::new(KeywordAnalyzer::new()),
            synthesizer: AtomSynthesizer::new(config.synthesis.clone()),
            store: Arc::new(MemoryStore::new()),
            graph: Arc::new(TrustGraph::new()),
            config,
        })
    }

    /// Replace the default in-memory store.
    pub fn with_store(mut self, store: Arc<dyn AtomStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the built-in keyword analyzer.
    pub fn with_analyzer(mut self, analyzer: Box<dyn ContentAnalysis>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Run one feedback record through the whole pipeline.
    pub fn process_feedback(&self, feedback: &Feedback) -> Result<ProcessOutcome, TrustError> {
        let mention = feedback.mention();
        if mention.is_blank() {
            tracing::trace!(source = %feedback.source, "skipping blank mention");
            return Ok(ProcessOutcome::Skipped);
        }

        let snapshot = self.registry.snapshot();
        let mut match_result = self.arbiter.resolve(&mention, &snapshot)?;
        calibrate(&mut match_result, &mention, &snapshot);

        let category = snapshot
            .get(&match_result.product_id)
            .map(|p| p.category.as_str())
            .filter(|c| !c.is_empty())
            .unwrap_or("unknown");

        let (sentiment_label, sentiment_confidence) = self.analyzer.sentiment(&feedback.text);
        let analysis = Analysis {
            sentiment_label,
            sentiment_confidence,
            tags: self.analyzer.tags(&feedback.text, category),
            summary: self.analyzer.summarize(&feedback.text),
            authenticity: self.analyzer.authenticity(feedback),
        };

        let atom = self.synthesizer.synthesize(feedback, match_result, analysis);

        // The store is the system of record; it is written before the graph
        // so a replay always reproduces what readers could have observed.
        self.store.append(&atom)?;
        match self.graph.ingest(&atom, snapshot.get(&atom.product_id)) {
            Ok(_) => Ok(ProcessOutcome::Atom(atom)),
            Err(e) => {
                tracing::warn!(atom_id = %atom.atom_id, error = %e, "atom dropped at admission");
                Ok(ProcessOutcome::Dropped)
            }
        }
    }

    /// Process a batch in parallel.
    ///
    /// Each record runs the full pipeline independently; failures are counted
    /// and logged, never propagated. Cancellation is honored between records.
    pub fn process_batch(&self, batch: &[Feedback], cancel: &CancelToken) -> BatchReport {
        let tallies: Vec<Tally> = batch
            .par_iter()
            .map(|feedback| {
                if cancel.is_cancelled() {
                    return Tally::Cancelled;
                }
                match self.process_feedback(feedback) {
                    Ok(ProcessOutcome::Atom(atom)) => {
                        if atom.product_match_info.is_fallback() {
                            Tally::Fallback
                        } else {
                            Tally::Matched(atom.product_match_info.match_method)
                        }
                    }
                    Ok(ProcessOutcome::Skipped) => Tally::Skipped,
                    Ok(ProcessOutcome::Dropped) => Tally::Dropped,
                    Err(e) => {
                        tracing::error!(error = %e, "feedback record failed");
                        Tally::Error
                    }
                }
            })
            .collect();

        let mut report = BatchReport {
            total: batch.len(),
            ..BatchReport::default()
        };
        for tally in tallies {
            match tally {
                Tally::Matched(method) => {
                    *report.matched_by_stage.entry(method).or_insert(0) += 1;
                }
                Tally::Fallback => report.fallback += 1,
                Tally::Skipped => report.skipped += 1,
                Tally::Dropped => report.dropped += 1,
                Tally::Error => report.errors += 1,
                Tally::Cancelled => report.cancelled += 1,
            }
        }
        report
    }

    /// Resolve and calibrate one mention without synthesizing an atom.
    pub fn resolve(&self, text: &str) -> Result<MatchResult, TrustError> {
        let mention = Mention::new(text);
        let snapshot = self.registry.snapshot();
        let mut result = self.arbiter.resolve(&mention, &snapshot)?;
        calibrate(&mut result, &mention, &snapshot);
        Ok(result)
    }

    /// Aggregated trust context for a product.
    pub fn trust_context(&self, product_id: &str) -> Arc<TrustContext> {
        self.graph
            .product_trust_context(product_id, &self.config.aggregation)
    }

    /// Replay every stored atom into the graph.
    ///
    /// The graph is a derived view; replaying a warm graph is a no-op per
    /// atom and replaying a fresh one reproduces the same aggregates.
    pub fn replay_store(&self) -> Result<ReplayStats, TrustError> {
        let snapshot = self.registry.snapshot();
        let mut stats = ReplayStats::default();
        for atom in self.store.iterate(&AtomFilter::any())? {
            match self.graph.ingest(&atom, snapshot.get(&atom.product_id)) {
                Ok(true) => stats.admitted += 1,
                Ok(false) => stats.duplicates += 1,
                Err(_) => stats.rejected += 1,
            }
        }
        tracing::info!(
            admitted = stats.admitted,
            duplicates = stats.duplicates,
            rejected = stats.rejected,
            "store replay finished"
        );
        Ok(stats)
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &TrustGraph {
        &self.graph
    }

    pub fn store(&self) -> &dyn AtomStore {
        self.store.as_ref()
    }

    pub fn suggestions(&self) -> &SuggestionLog {
        self.arbiter.suggestions()
    }

    pub fn match_stats(&self) -> MatchStats {
        self.arbiter.stats()
    }

    pub fn info(&self) -> PipelineInfo {
        let snapshot = self.registry.snapshot();
        PipelineInfo {
            products: snapshot.len(),
            aliases: snapshot.alias_count(),
            registry_generation: self.registry.generation(),
            atoms: self.graph.atom_count(),
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            unmatched_suggestions: self.suggestions().len(),
            stats: self.match_stats(),
        }
    }
}

/// Snapshot of pipeline state for the `info` command.
#[derive(Debug, Clone)]
pub struct PipelineInfo {
    pub products: usize,
    pub aliases: usize,
    pub registry_generation: u64,
    pub atoms: usize,
    pub nodes: usize,
    pub edges: usize,
    pub unmatched_suggestions: usize,
    pub stats: MatchStats,
}

impl fmt::Display for PipelineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "trustgraph pipeline info")?;
        writeln!(f, "  products:     {}", self.products)?;
        writeln!(f, "  aliases:      {}", self.aliases)?;
        writeln!(f, "  registry gen: {}", self.registry_generation)?;
        writeln!(f, "  atoms:        {}", self.atoms)?;
        writeln!(f, "  graph nodes:  {}", self.nodes)?;
        writeln!(f, "  graph edges:  {}", self.edges)?;
        writeln!(f, "  unmatched:    {}", self.unmatched_suggestions)?;
        for stage in &self.stats.stages {
            writeln!(
                f,
                "  stage {}: {} invocations, {} accepts",
                stage.name, stage.invocations, stage.accepts
            )?;
        }
        writeln!(f, "  fallbacks:    {}", self.stats.fallbacks)?;
        Ok(())
    }
}

enum Tally {
    Matched(MatchMethod),
    Fallback,
    Skipped,
    Dropped,
    Error,
    Cancelled,
}

/// Provider selection. "none" and unknown providers disable the stage.
fn build_embedder(config: &EmbedConfig) -> Option<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Some(Arc::new(HashEmbedder::new(config.dimension))),
        "http" => {
            let Some(url) = config.url.clone() else {
                tracing::warn!("http embed provider configured without a url");
                return None;
            };
            let timeout = Duration::from_millis(config.timeout_ms);
            Some(Arc::new(DeadlineEmbedder::new(
                HttpEmbedder::new(url, timeout),
                timeout,
            )))
        }
        "none" => None,
        other => {
            tracing::warn!(provider = other, "unknown embed provider");
            None
        }
    }
}
