//! Core types for Autopost

use std::path::Path;

use chrono::{DateTime, Utc};

/// A video discovered by a source listing, not yet confirmed published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    /// Unique within a source: Drive file id, or absolute path for local folders
    pub identifier: String,
    /// Human-facing name, used for captions and download filenames
    pub display_name: String,
    /// Where the media lives: Drive file id or local path
    pub location_hint: String,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl VideoCandidate {
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>, location_hint: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            location_hint: location_hint.into(),
            mime_type: None,
            created_at: None,
        }
    }
}

// ============================================================================
// Video Container Types
// ============================================================================

/// Video containers accepted from local folders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoContainer {
    Mp4,
    Mov,
    M4v,
    Avi,
    Mkv,
    WebM,
}

impl VideoContainer {
    pub const ALL: [VideoContainer; 6] = [
        VideoContainer::Mp4,
        VideoContainer::Mov,
        VideoContainer::M4v,
        VideoContainer::Avi,
        VideoContainer::Mkv,
        VideoContainer::WebM,
    ];

    /// Detect container from file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "mov" => Some(Self::Mov),
            "m4v" => Some(Self::M4v),
            "avi" => Some(Self::Avi),
            "mkv" => Some(Self::Mkv),
            "webm" => Some(Self::WebM),
            _ => None,
        }
    }

    /// Detect container from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect container from a MIME type as reported by Drive
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        Self::ALL
            .into_iter()
            .find(|container| container.as_mime_str().eq_ignore_ascii_case(essence))
    }

    /// Canonical lowercase file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::M4v => "m4v",
            Self::Avi => "avi",
            Self::Mkv => "mkv",
            Self::WebM => "webm",
        }
    }

    pub fn as_mime_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Mov => "video/quicktime",
            Self::M4v => "video/x-m4v",
            Self::Avi => "video/x-msvideo",
            Self::Mkv => "video/x-matroska",
            Self::WebM => "video/webm",
        }
    }
}
