//! Rich diagnostic error types for the trustgraph engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the trustgraph engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TrustError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    #[diagnostic(
        code(trust::config::io),
        help("Check that the config file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {message}")]
    #[diagnostic(
        code(trust::config::parse),
        help("The config file is not valid TOML. Check for syntax errors near the reported location.")
    )]
    Parse { message: String },

    #[error("invalid threshold `{name}`: {value}")]
    #[diagnostic(
        code(trust::config::threshold),
        help(
            "Thresholds must lie in [0.0, 1.0], the cascade must satisfy \
             semantic_accept <= fuzzy_accept <= exact_accept, and the synthesis \
             weights must sum to 1.0."
        )
    )]
    InvalidThreshold { name: String, value: f64 },
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("failed to read registry file {path}: {source}")]
    #[diagnostic(
        code(trust::registry::io),
        help(
            "A filesystem operation failed while loading the product registry. \
             Check that the file exists and has read permissions."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registry parse error: {message}")]
    #[diagnostic(
        code(trust::registry::parse),
        help(
            "The registry file is not valid JSON, or an entry does not match the \
             expected schema. Fix the reported entry and reload."
        )
    )]
    Parse { message: String },

    #[error("registry contains no valid products ({rejected} entries rejected)")]
    #[diagnostic(
        code(trust::registry::empty),
        help(
            "Every entry in the registry failed validation. A product entry needs \
             a non-empty product_id and canonical_name. See the load report for \
             per-entry reasons."
        )
    )]
    Empty { rejected: usize },

    #[error("unknown product: {product_id}")]
    #[diagnostic(
        code(trust::registry::unknown_product),
        help("No product with this canonical id exists in the active registry snapshot.")
    )]
    UnknownProduct { product_id: String },
}

// ---------------------------------------------------------------------------
// Matcher errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MatchError {
    #[error("mention text is empty after normalization")]
    #[diagnostic(
        code(trust::matcher::empty_mention),
        help(
            "The mention contained no usable text (only URLs, punctuation, or \
             whitespace). Such mentions are skipped rather than matched."
        )
    )]
    EmptyMention,

    #[error("failed to append to suggestion log: {source}")]
    #[diagnostic(
        code(trust::matcher::suggestion_sink),
        help(
            "The unmatched-mention suggestion log could not be written. \
             Check permissions on the log file and available disk space."
        )
    )]
    SuggestionSink {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Embedding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EmbedError {
    #[error("embedding service unavailable at {url}: {message}")]
    #[diagnostic(
        code(trust::embed::unavailable),
        help(
            "The embedding provider did not respond. The semantic match stage is \
             skipped when this happens; exact and fuzzy matching still run. \
             Check that the service is running and reachable."
        )
    )]
    ServiceUnavailable { url: String, message: String },

    #[error("embedding request timed out after {waited_ms} ms")]
    #[diagnostic(
        code(trust::embed::timeout),
        help(
            "The provider exceeded the configured deadline. Increase \
             `embed.timeout_ms` or switch to the deterministic hash provider."
        )
    )]
    Timeout { waited_ms: u64 },

    #[error("malformed embedding response: {message}")]
    #[diagnostic(
        code(trust::embed::bad_response),
        help("The provider returned a payload without a numeric `embedding` array.")
    )]
    BadResponse { message: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(trust::embed::dim_mismatch),
        help(
            "All vectors compared by the semantic stage must share one dimension. \
             Rebuild the product embeddings after changing providers."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot embed empty text")]
    #[diagnostic(
        code(trust::embed::empty_input),
        help("Normalize and check the mention text before requesting an embedding.")
    )]
    EmptyInput,
}

// ---------------------------------------------------------------------------
// Trust atom errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AtomError {
    #[error("trust atom missing required field: {field}")]
    #[diagnostic(
        code(trust::atom::missing_field),
        help("Every trust atom needs atom_id, product_id, source, and a timestamp.")
    )]
    MissingField { field: &'static str },

    #[error("trust atom field `{field}` out of range: {value}")]
    #[diagnostic(
        code(trust::atom::out_of_range),
        help("Confidence, match score, and authenticity must lie in [0.0, 1.0].")
    )]
    OutOfRange { field: &'static str, value: f64 },

    #[error("trust atom field `{field}` is malformed: {reason}")]
    #[diagnostic(
        code(trust::atom::malformed_field),
        help(
            "The synthesizer only emits well-formed atoms; a malformed field \
             usually means a hand-edited or corrupted store line."
        )
    )]
    Malformed {
        field: &'static str,
        reason: &'static str,
    },

    #[error("trust atom has empty mention text")]
    #[diagnostic(
        code(trust::atom::empty_text),
        help("Atoms are only synthesized for mentions with usable text; reject this record upstream.")
    )]
    EmptyText,
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("rejected atom {atom_id} at ingest")]
    #[diagnostic(
        code(trust::graph::rejected),
        help(
            "The atom failed schema validation and was not added to the graph. \
             An audit entry records the reason; nothing was partially written."
        )
    )]
    Rejected {
        atom_id: String,
        #[source]
        source: AtomError,
    },
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StorageError {
    #[error("atom store I/O failure at {path}: {source}")]
    #[diagnostic(
        code(trust::storage::io),
        help("Check that the store file and its parent directory are writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode atom {atom_id} for storage")]
    #[diagnostic(
        code(trust::storage::encode),
        help("This indicates a serialization bug; the atom was not written.")
    )]
    Encode {
        atom_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the engine.
pub type TrustResult<T> = std::result::Result<T, TrustError>;
