//! Autopost - publish videos from a folder to X, one per interval
//!
//! This library provides the pieces of the autopost tool: configuration,
//! the posted-video ledger, video sources (Google Drive or a local folder),
//! the X publishing client, and the cycle that ties them together.

pub mod caption;
pub mod config;
pub mod cycle;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod picker;
pub mod platforms;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use caption::Caption;
pub use config::{Config, Overrides};
pub use cycle::{run_cycle, run_guarded, run_loop, run_once, CycleOutcome};
pub use error::{AutopostError, Result};
pub use ledger::Ledger;
pub use types::VideoCandidate;
