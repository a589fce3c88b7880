//! Local folder source
//!
//! Lists video files directly inside one directory (non-recursive), oldest
//! modification time first. The absolute path is both identifier and
//! location, and files are uploaded in place.

use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, SourceError};
use crate::sources::{FetchedMedia, VideoSource, LOCAL_LEDGER_KEY};
use crate::types::{VideoCandidate, VideoContainer};

pub struct LocalFolderSource {
    folder: PathBuf,
}

impl LocalFolderSource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn scan(&self) -> Result<Vec<VideoCandidate>> {
        let folder = self.folder.canonicalize().map_err(|e| {
            SourceError::Listing(format!(
                "video folder {} is not accessible: {}",
                self.folder.display(),
                e
            ))
        })?;
        if !folder.is_dir() {
            return Err(SourceError::Listing(format!(
                "video folder {} is not a directory",
                folder.display()
            ))
            .into());
        }

        let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&folder).map_err(SourceError::Io)? {
            let entry = entry.map_err(SourceError::Io)?;
            let path = entry.path();
            if VideoContainer::from_path(&path).is_none() {
                continue;
            }
            // Follows symlinks, so a link to a regular file counts
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().map_err(SourceError::Io)?;
            found.push((modified, path));
        }

        found.sort();

        Ok(found
            .into_iter()
            .map(|(modified, path)| {
                let location = path.to_string_lossy().to_string();
                let display_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| location.clone());
                VideoCandidate {
                    identifier: location.clone(),
                    display_name,
                    location_hint: location,
                    mime_type: VideoContainer::from_path(&path)
                        .map(|c| c.as_mime_str().to_string()),
                    created_at: Some(DateTime::<Utc>::from(modified)),
                }
            })
            .collect())
    }
}

#[async_trait]
impl VideoSource for LocalFolderSource {
    fn name(&self) -> &str {
        "local"
    }

    fn ledger_key(&self) -> &str {
        LOCAL_LEDGER_KEY
    }

    async fn list(&self) -> Result<Vec<VideoCandidate>> {
        let candidates = self.scan()?;
        tracing::debug!(
            "Found {} video file(s) in {}",
            candidates.len(),
            self.folder.display()
        );
        Ok(candidates)
    }

    async fn fetch(&self, candidate: &VideoCandidate) -> Result<FetchedMedia> {
        let path = PathBuf::from(&candidate.location_hint);
        if !path.is_file() {
            return Err(SourceError::Download(format!(
                "{} no longer exists",
                path.display()
            ))
            .into());
        }
        Ok(FetchedMedia::in_place(path))
    }
}
