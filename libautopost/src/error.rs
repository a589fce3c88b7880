//! Error types for Autopost

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutopostError>;

#[derive(Error, Debug)]
pub enum AutopostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl AutopostError {
    /// Returns true for errors that must stop the process before any cycle runs
    pub fn is_fatal(&self) -> bool {
        matches!(self, AutopostError::Config(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Video folder {path} is not usable: {reason}")]
    InvalidFolder { path: PathBuf, reason: String },

    #[error("Invalid caption template: {0}")]
    InvalidTemplate(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("State file {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Listing failed: {0}")]
    Listing(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Media validation failed: {0}")]
    Validation(String),

    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
