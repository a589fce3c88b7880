//! Configuration management for Autopost
//!
//! Configuration is read once at startup from environment variables, with a
//! handful of CLI overrides layered on top, and is immutable afterwards.
//! Empty variables count as unset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::caption::{Caption, CaptionTemplate, DEFAULT_TEMPLATE};
use crate::error::{ConfigError, Result};
use crate::ledger::DEFAULT_STATE_FILE;
use crate::sources::{DRIVE_LEDGER_KEY, LOCAL_LEDGER_KEY};

pub const ENV_LOCAL_FOLDER: &str = "LOCAL_VIDEO_FOLDER";
pub const ENV_DRIVE_FOLDER_ID: &str = "GOOGLE_DRIVE_FOLDER_ID";
pub const ENV_SERVICE_ACCOUNT_FILE: &str = "GOOGLE_SERVICE_ACCOUNT_FILE";
pub const ENV_CONSUMER_KEY: &str = "TWITTER_CONSUMER_KEY";
pub const ENV_CONSUMER_SECRET: &str = "TWITTER_CONSUMER_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
pub const ENV_ACCESS_TOKEN_SECRET: &str = "TWITTER_ACCESS_TOKEN_SECRET";
pub const ENV_TWEET_TEMPLATE: &str = "TWEET_TEMPLATE";
pub const ENV_POST_CAPTION: &str = "POST_CAPTION";
pub const ENV_STATE_FILE: &str = "STATE_FILE";
pub const ENV_INTERVAL: &str = "POST_INTERVAL_SECONDS";

pub const DEFAULT_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug)]
pub struct Config {
    pub source: SourceConfig,
    pub x: XCredentials,
    pub caption: Caption,
    pub state_file: PathBuf,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Drive {
        folder_id: String,
        service_account_file: PathBuf,
    },
    Local {
        folder: PathBuf,
    },
}

impl SourceConfig {
    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            SourceConfig::Drive { .. } => "drive",
            SourceConfig::Local { .. } => "local",
        }
    }

    /// Key under which published identifiers are stored in the state file
    pub fn ledger_key(&self) -> &'static str {
        match self {
            SourceConfig::Drive { .. } => DRIVE_LEDGER_KEY,
            SourceConfig::Local { .. } => LOCAL_LEDGER_KEY,
        }
    }
}

/// OAuth 1.0a user-context credentials for X
///
/// Secrets are redacted from `Debug` output.
#[derive(Debug)]
pub struct XCredentials {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub access_token: SecretString,
    pub access_token_secret: SecretString,
}

/// Values supplied on the command line, which take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interval_seconds: Option<u64>,
    pub state_file: Option<PathBuf>,
    pub caption: Option<String>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env(overrides: &Overrides) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), overrides)
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, overrides: &Overrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        let source = match get(ENV_LOCAL_FOLDER) {
            Some(folder) => SourceConfig::Local {
                folder: validate_folder(&expand_path(&folder))?,
            },
            None => SourceConfig::Drive {
                folder_id: require(ENV_DRIVE_FOLDER_ID)?,
                service_account_file: expand_path(&require(ENV_SERVICE_ACCOUNT_FILE)?),
            },
        };

        let x = XCredentials {
            consumer_key: SecretString::from(require(ENV_CONSUMER_KEY)?),
            consumer_secret: SecretString::from(require(ENV_CONSUMER_SECRET)?),
            access_token: SecretString::from(require(ENV_ACCESS_TOKEN)?),
            access_token_secret: SecretString::from(require(ENV_ACCESS_TOKEN_SECRET)?),
        };

        let caption = match &source {
            SourceConfig::Drive { .. } => {
                if overrides.caption.is_some() {
                    return Err(ConfigError::InvalidValue {
                        key: "--caption".to_string(),
                        reason: format!(
                            "only applies to local folders; set {} for Drive captions",
                            ENV_TWEET_TEMPLATE
                        ),
                    }
                    .into());
                }
                // An explicitly empty template is honoured as an empty caption
                let template = lookup(ENV_TWEET_TEMPLATE).unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
                Caption::Template(CaptionTemplate::parse(&template)?)
            }
            SourceConfig::Local { .. } => Caption::Fixed(
                overrides
                    .caption
                    .clone()
                    .or_else(|| lookup(ENV_POST_CAPTION))
                    .unwrap_or_default(),
            ),
        };

        let state_file = overrides
            .state_file
            .clone()
            .or_else(|| get(ENV_STATE_FILE).map(|path| expand_path(&path)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));

        let interval_seconds = match overrides.interval_seconds {
            Some(seconds) => seconds,
            None => match get(ENV_INTERVAL) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_INTERVAL.to_string(),
                    reason: format!("expected a whole number of seconds, got '{}'", raw),
                })?,
                None => DEFAULT_INTERVAL_SECONDS,
            },
        };
        if interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_INTERVAL.to_string(),
                reason: "interval must be at least one second".to_string(),
            }
            .into());
        }

        Ok(Self {
            source,
            x,
            caption,
            state_file,
            interval: Duration::from_secs(interval_seconds),
        })
    }

    pub fn ledger_key(&self) -> &'static str {
        self.source.ledger_key()
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

/// Check that a local video folder exists and is a directory
pub fn validate_folder(folder: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(folder).map_err(|e| ConfigError::InvalidFolder {
        path: folder.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::InvalidFolder {
            path: folder.to_path_buf(),
            reason: "not a directory".to_string(),
        }
        .into());
    }
    Ok(folder.to_path_buf())
}
