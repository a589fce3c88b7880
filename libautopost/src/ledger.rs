//! Persisted record of already-published videos
//!
//! The ledger is a JSON object holding a sorted array of identifiers under a
//! source-specific key (`posted_ids` for Drive, `posted_files` for local
//! folders). Other top-level keys found in the file are carried through
//! untouched when the ledger is rewritten.
//!
//! No file locking is performed: at most one process may use a given state
//! file at a time.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{LedgerError, Result};

/// Default location of the state file, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = ".autopost_state.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    key: String,
    posted: BTreeSet<String>,
    extra: Map<String, Value>,
}

impl Ledger {
    /// Create an empty ledger tracking identifiers under `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            posted: BTreeSet::new(),
            extra: Map::new(),
        }
    }

    /// Load the ledger at `path`
    ///
    /// A missing file yields an empty ledger. A file that exists but cannot be
    /// read or parsed is an error; the caller must not fall back to an empty
    /// ledger, since saving that would drop history.
    pub fn load(path: &Path, key: &str) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file at {}, starting empty", path.display());
                return Ok(Self::new(key));
            }
            Err(e) => {
                return Err(LedgerError::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
                .into())
            }
        };

        let document: Value = serde_json::from_str(&content).map_err(|e| LedgerError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        let Value::Object(mut extra) = document else {
            return Err(malformed(path, "top-level value is not an object"));
        };

        let posted = match extra.remove(key) {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(id) => Ok(id),
                    other => Err(malformed(
                        path,
                        &format!("'{}' contains a non-string entry: {}", key, other),
                    )),
                })
                .collect::<Result<BTreeSet<_>>>()?,
            Some(other) => {
                return Err(malformed(
                    path,
                    &format!("'{}' is not an array: {}", key, other),
                ))
            }
        };

        tracing::debug!(
            "Loaded {} posted identifier(s) from {}",
            posted.len(),
            path.display()
        );

        Ok(Self {
            key: key.to_string(),
            posted,
            extra,
        })
    }

    /// Write the full ledger to `path`, replacing any previous content
    ///
    /// The document is written to a sibling temporary file and renamed into
    /// place, so readers never observe a partially written ledger. An existing
    /// file keeps its permissions; a new one is created owner-only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source: std::io::Error| LedgerError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let json = serde_json::to_string_pretty(&self.to_document())
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let mut staged = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        staged.write_all(json.as_bytes()).map_err(write_err)?;
        staged.write_all(b"\n").map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;

        // The rename replaces the inode, so carry over the old file's mode
        if let Ok(existing) = std::fs::metadata(path) {
            staged
                .as_file()
                .set_permissions(existing.permissions())
                .map_err(write_err)?;
        }
        staged.persist(path).map_err(|e| write_err(e.error))?;

        tracing::debug!("Saved {} posted identifier(s) to {}", self.posted.len(), path.display());
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.posted.contains(identifier)
    }

    /// Record a published identifier. Returns false if it was already present.
    pub fn record(&mut self, identifier: impl Into<String>) -> bool {
        self.posted.insert(identifier.into())
    }

    pub fn posted(&self) -> &BTreeSet<String> {
        &self.posted
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.posted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posted.is_empty()
    }

    fn to_document(&self) -> Value {
        let mut document = self.extra.clone();
        document.insert(
            self.key.clone(),
            Value::Array(self.posted.iter().cloned().map(Value::String).collect()),
        );
        Value::Object(document)
    }
}

fn malformed(path: &Path, reason: &str) -> crate::error::AutopostError {
    LedgerError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}
