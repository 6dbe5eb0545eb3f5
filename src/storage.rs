//! Atom storage: the append-only record the graph can be rebuilt from.
//!
//! The engine only needs the [`AtomStore`] contract. [`MemoryStore`] backs
//! tests and short-lived runs; [`JsonlStore`] appends one JSON document per
//! line so the history survives restarts and stays greppable.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use crate::atom::{Source, TrustAtom};
use crate::error::StorageError;

/// Storage contract required by the pipeline.
pub trait AtomStore: Send + Sync {
    /// Append one atom. Atoms are never rewritten or deleted.
    fn append(&self, atom: &TrustAtom) -> Result<(), StorageError>;

    /// All stored atoms matching the filter, in append order.
    fn iterate(&self, filter: &AtomFilter) -> Result<Vec<TrustAtom>, StorageError>;
}

/// Conjunctive atom filter; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AtomFilter {
    pub product_id: Option<String>,
    pub source: Option<Source>,
    pub tag: Option<String>,
    pub min_confidence: Option<f64>,
}

impl AtomFilter {
    /// Matches every atom.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn for_product(product_id: impl Into<String>) -> Self {
        Self {
            product_id: Some(product_id.into()),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    pub fn matches(&self, atom: &TrustAtom) -> bool {
        if let Some(product_id) = &self.product_id {
            if atom.product_id != *product_id {
                return false;
            }
        }
        if let Some(source) = self.source {
            if atom.source != source {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !atom.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(min_confidence) = self.min_confidence {
            if atom.confidence_score < min_confidence {
                return false;
            }
        }
        true
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    atoms: RwLock<Vec<TrustAtom>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.atoms.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AtomStore for MemoryStore {
    fn append(&self, atom: &TrustAtom) -> Result<(), StorageError> {
        self.atoms
            .write()
            .expect("store lock poisoned")
            .push(atom.clone());
        Ok(())
    }

    fn iterate(&self, filter: &AtomFilter) -> Result<Vec<TrustAtom>, StorageError> {
        Ok(self
            .atoms
            .read()
            .expect("store lock poisoned")
            .iter()
            .filter(|atom| filter.matches(atom))
            .cloned()
            .collect())
    }
}

/// Newline-delimited JSON store, one atom per line.
pub struct JsonlStore {
    path: PathBuf,
    sink: Mutex<File>,
}

impl JsonlStore {
    /// Open or create the store file, appending to any existing history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        let sink = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            sink: Mutex::new(sink),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl AtomStore for JsonlStore {
    fn append(&self, atom: &TrustAtom) -> Result<(), StorageError> {
        let line = serde_json::to_string(atom).map_err(|source| StorageError::Encode {
            atom_id: atom.atom_id.clone(),
            source,
        })?;
        let mut sink = self.sink.lock().expect("store lock poisoned");
        writeln!(sink, "{line}").map_err(|e| self.io_error(e))?;
        sink.flush().map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn iterate(&self, filter: &AtomFilter) -> Result<Vec<TrustAtom>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut atoms = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrustAtom>(&line) {
                Ok(atom) => {
                    if filter.matches(&atom) {
                        atoms.push(atom);
                    }
                }
                // A torn tail line from an interrupted write must not block
                // replay of the rest of the history.
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "skipping malformed store line");
                }
            }
        }
        Ok(atoms)
    }
}
