//! Video source abstraction and implementations
//!
//! A source enumerates candidate videos in a stable, oldest-first order and
//! makes the chosen one available as a local file. The cycle is written
//! against [`VideoSource`] only, so Drive folders and local directories are
//! interchangeable.
//!
//! # Examples
//!
//! ```no_run
//! use libautopost::sources::{local::LocalFolderSource, VideoSource};
//!
//! # async fn example() -> libautopost::error::Result<()> {
//! let source = LocalFolderSource::new("/srv/videos");
//! for candidate in source.list().await? {
//!     println!("{} -> {}", candidate.identifier, candidate.display_name);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::{Config, SourceConfig};
use crate::error::{Result, SourceError};
use crate::types::{VideoCandidate, VideoContainer};

pub mod drive;
pub mod google_auth;
pub mod local;

// Mock source is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Ledger key for Drive-sourced identifiers
pub const DRIVE_LEDGER_KEY: &str = "posted_ids";

/// Ledger key for local-folder identifiers
pub const LOCAL_LEDGER_KEY: &str = "posted_files";

/// Prefix of the per-cycle scratch directory used for downloads
pub const SCRATCH_PREFIX: &str = "autopost_";

#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Lowercase identifier for logs (e.g., "drive", "local")
    fn name(&self) -> &str;

    /// Key under which this source's identifiers are stored in the state file
    fn ledger_key(&self) -> &str;

    /// List candidate videos, oldest first
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the listing cannot be obtained.
    async fn list(&self) -> Result<Vec<VideoCandidate>>;

    /// Make the candidate's media available on local disk
    ///
    /// Remote sources download into a fresh scratch directory owned by the
    /// returned [`FetchedMedia`]; local sources hand back the existing path.
    async fn fetch(&self, candidate: &VideoCandidate) -> Result<FetchedMedia>;
}

/// A media file ready for upload
///
/// When the file was downloaded, the scratch directory holding it is removed
/// as soon as this value is dropped, whichever way the cycle ends.
#[derive(Debug)]
pub struct FetchedMedia {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl FetchedMedia {
    /// Media that already lives on disk and must not be deleted
    pub fn in_place(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch: None,
        }
    }

    /// Media written into a scratch directory this value now owns
    pub fn downloaded(path: impl Into<PathBuf>, scratch: TempDir) -> Self {
        Self {
            path: path.into(),
            scratch: Some(scratch),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|dir| dir.path())
    }
}

/// Create a fresh scratch directory for one download
pub fn scratch_dir() -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(SourceError::Io)?;
    Ok(dir)
}

/// Longest file name most filesystems accept, in bytes
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Longest suffix treated as an extension when shortening a name
const MAX_EXTENSION_BYTES: usize = 16;

/// Turn a listed display name into a safe single path component
///
/// Separators are replaced and over-long names are shortened, keeping the
/// extension.
pub fn safe_file_name(display_name: &str, fallback: &str) -> String {
    let cleaned: String = display_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        cap_file_name(fallback)
    } else {
        cap_file_name(trimmed)
    }
}

/// File name for downloaded media whose extension agrees with its MIME type
///
/// Upload code detects the container from the extension, so a name without
/// one (or with a different one) gets the listed type's extension appended.
pub fn media_file_name(candidate: &VideoCandidate) -> String {
    let name = safe_file_name(&candidate.display_name, &candidate.identifier);
    let listed = candidate.mime_type.as_deref().and_then(VideoContainer::from_mime);

    match listed {
        Some(container) if VideoContainer::from_path(Path::new(&name)) != Some(container) => {
            cap_file_name(&format!("{}.{}", name, container.extension()))
        }
        _ => name,
    }
}

fn cap_file_name(name: &str) -> String {
    if name.len() <= MAX_FILE_NAME_BYTES {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES => name.split_at(dot),
        _ => (name, ""),
    };
    let budget = MAX_FILE_NAME_BYTES - extension.len();
    let mut end = budget.min(stem.len());
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &stem[..end], extension)
}

/// Build the source selected by configuration
///
/// Construction is cheap and performs no I/O; credentials are checked on the
/// first real call.
pub fn create_source(config: &Config) -> Result<Box<dyn VideoSource>> {
    let source: Box<dyn VideoSource> = match &config.source {
        SourceConfig::Drive {
            folder_id,
            service_account_file,
        } => Box::new(drive::DriveSource::new(
            folder_id.clone(),
            service_account_file.clone(),
        )?),
        SourceConfig::Local { folder } => Box::new(local::LocalFolderSource::new(folder.clone())),
    };
    Ok(source)
}
