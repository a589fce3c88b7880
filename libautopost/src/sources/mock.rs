//! Mock source implementation for testing
//!
//! Serves a configurable candidate list, can simulate listing and download
//! failures, and records the scratch directories it creates so tests can
//! verify they are cleaned up.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, SourceError};
use crate::sources::{media_file_name, scratch_dir, FetchedMedia, VideoSource, DRIVE_LEDGER_KEY};
use crate::types::VideoCandidate;

/// Configuration for mock source behavior
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    /// Source name reported in logs
    pub name: String,

    /// Ledger key reported to the cycle
    pub ledger_key: String,

    /// Candidates returned by `list`, shared so tests can change them between cycles
    pub candidates: Arc<Mutex<Vec<VideoCandidate>>>,

    /// Error to return from `list`
    pub list_error: Option<String>,

    /// Error to return from `fetch`
    pub fetch_error: Option<String>,

    /// Number of times `list` has been called
    pub list_call_count: Arc<Mutex<usize>>,

    /// Scratch directories created by `fetch`
    pub scratch_dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            ledger_key: DRIVE_LEDGER_KEY.to_string(),
            candidates: Arc::new(Mutex::new(Vec::new())),
            list_error: None,
            fetch_error: None,
            list_call_count: Arc::new(Mutex::new(0)),
            scratch_dirs: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock source behaving like a remote folder: `fetch` writes into a scratch directory
pub struct MockSource {
    config: MockSourceConfig,
}

impl MockSource {
    pub fn new(config: MockSourceConfig) -> Self {
        Self { config }
    }

    /// Create a mock source listing the given identifiers, in order
    pub fn with_ids(ids: &[&str]) -> Self {
        let candidates = ids
            .iter()
            .map(|id| VideoCandidate::new(*id, format!("{}.mp4", id), *id))
            .collect();
        Self::new(MockSourceConfig {
            candidates: Arc::new(Mutex::new(candidates)),
            ..Default::default()
        })
    }

    /// Create a mock source whose listing always fails
    pub fn list_failure(error: &str) -> Self {
        Self::new(MockSourceConfig {
            list_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock source whose downloads always fail
    pub fn fetch_failure(ids: &[&str], error: &str) -> Self {
        let mut source = Self::with_ids(ids);
        source.config.fetch_error = Some(error.to_string());
        source
    }

    pub fn set_candidates(&self, candidates: Vec<VideoCandidate>) {
        *self.config.candidates.lock().unwrap() = candidates;
    }

    pub fn list_call_count(&self) -> usize {
        *self.config.list_call_count.lock().unwrap()
    }

    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        self.config.scratch_dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoSource for MockSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn ledger_key(&self) -> &str {
        &self.config.ledger_key
    }

    async fn list(&self) -> Result<Vec<VideoCandidate>> {
        *self.config.list_call_count.lock().unwrap() += 1;

        if let Some(error) = &self.config.list_error {
            return Err(SourceError::Listing(error.clone()).into());
        }
        Ok(self.config.candidates.lock().unwrap().clone())
    }

    async fn fetch(&self, candidate: &VideoCandidate) -> Result<FetchedMedia> {
        let scratch = scratch_dir()?;
        self.config
            .scratch_dirs
            .lock()
            .unwrap()
            .push(scratch.path().to_path_buf());

        if let Some(error) = &self.config.fetch_error {
            return Err(SourceError::Download(error.clone()).into());
        }

        let path = scratch.path().join(media_file_name(candidate));
        std::fs::write(&path, candidate.identifier.as_bytes()).map_err(SourceError::Io)?;
        Ok(FetchedMedia::downloaded(path, scratch))
    }
}
