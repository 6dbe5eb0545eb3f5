//! Append-only log of mentions no stage could resolve.
//!
//! Each fallback writes exactly one entry. Entries feed the registry-growing
//! workflow: an operator reviews them, adds aliases or products, and reloads.
//! Writes are serialized behind one lock so concurrent fallbacks interleave
//! whole entries, never partial ones; the optional file sink is JSONL, one
//! entry per line, append-only.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

pub const STATUS_UNPROCESSED: &str = "unprocessed";

/// One unmatched mention, recorded for later registry curation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionEntry {
    pub mention_text: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

struct Inner {
    entries: Vec<SuggestionEntry>,
    sink: Option<File>,
}

/// The unmatched-suggestion log.
pub struct SuggestionLog {
    inner: Mutex<Inner>,
}

impl SuggestionLog {
    /// In-memory log with no file sink.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                sink: None,
            }),
        }
    }

    /// Log backed by a JSONL file, appended to on every entry.
    pub fn with_file(path: &Path) -> Result<Self, MatchError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MatchError::SuggestionSink { source: e })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MatchError::SuggestionSink { source: e })?;
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                sink: Some(file),
            }),
        })
    }

    /// Record one unmatched mention.
    pub fn append(&self, mention_text: &str) -> Result<(), MatchError> {
        let entry = SuggestionEntry {
            mention_text: mention_text.to_string(),
            timestamp: Utc::now(),
            status: STATUS_UNPROCESSED.into(),
        };

        let mut inner = self.inner.lock().expect("suggestion log lock poisoned");
        if let Some(file) = inner.sink.as_mut() {
            let line = serde_json::to_string(&entry).map_err(|e| MatchError::SuggestionSink {
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
            writeln!(file, "{line}").map_err(|e| MatchError::SuggestionSink { source: e })?;
        }
        inner.entries.push(entry);
        Ok(())
    }

    /// Snapshot of all entries recorded by this instance.
    pub fn entries(&self) -> Vec<SuggestionEntry> {
        self.inner
            .lock()
            .expect("suggestion log lock poisoned")
            .entries
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("suggestion log lock poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SuggestionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_records_entry_with_unprocessed_status() {
        let log = SuggestionLog::new();
        log.append("my face wash is amazing").unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mention_text, "my face wash is amazing");
        assert_eq!(entries[0].status, STATUS_UNPROCESSED);
    }

    #[test]
    fn file_sink_appends_one_json_line_per_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("suggestions.jsonl");
        let log = SuggestionLog::with_file(&path).unwrap();
        log.append("first mention").unwrap();
        log.append("second mention").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: SuggestionEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.mention_text, "first mention");
        assert_eq!(first.status, STATUS_UNPROCESSED);
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("suggestions.jsonl");
        {
            let log = SuggestionLog::with_file(&path).unwrap();
            log.append("before reopen").unwrap();
        }
        {
            let log = SuggestionLog::with_file(&path).unwrap();
            log.append("after reopen").unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn concurrent_appends_interleave_whole_entries() {
        use std::sync::Arc;

        let log = Arc::new(SuggestionLog::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let log = Arc::clone(&log);
            handles.push(std::thread::spawn(move || {
                for j in 0..25 {
                    log.append(&format!("mention {i}-{j}")).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 200);
    }
}
