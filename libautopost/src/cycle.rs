//! Posting cycle orchestration
//!
//! A cycle loads the ledger, lists the source, picks the oldest unposted
//! video, publishes it and records it. The ledger is only written after the
//! platform returns a post ID, so a failure anywhere leaves it untouched.
//!
//! [`run_loop`] repeats cycles forever on a fixed interval. Errors and panics
//! inside a cycle are logged and never end the loop.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use futures::FutureExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::caption::Caption;
use crate::config::Config;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::picker::pick;
use crate::platforms::{create_platform, Platform};
use crate::sources::{create_source, VideoSource};

/// Result of a cycle that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A video was published and recorded
    Posted { identifier: String, post_id: String },
    /// Every listed video is already in the ledger, or the source is empty
    NothingToDo,
}

/// Run one cycle against already-built clients
///
/// # Errors
///
/// Returns the first ledger, source, or platform error encountered. The
/// ledger file is only rewritten after a successful post.
pub async fn run_cycle(
    source: &dyn VideoSource,
    platform: &dyn Platform,
    caption: &Caption,
    state_file: &Path,
) -> Result<CycleOutcome> {
    let mut ledger = Ledger::load(state_file, source.ledger_key())?;

    let candidates = source.list().await?;
    info!("Found {} video(s) in {} source", candidates.len(), source.name());

    let Some(candidate) = pick(&candidates, ledger.posted()) else {
        info!("No new videos to post");
        return Ok(CycleOutcome::NothingToDo);
    };
    info!(
        "Selected {} ({})",
        candidate.display_name, candidate.identifier
    );

    // Scratch storage for remote media lives until `media` drops
    let media = source.fetch(candidate).await?;
    let text = caption.text_for(candidate);

    let post_id = platform.post_video(media.path(), &text).await?;
    info!("Posted {} to {} as {}", candidate.display_name, platform.name(), post_id);

    ledger.record(candidate.identifier.clone());
    if let Err(e) = ledger.save(state_file) {
        error!(
            "Post {} succeeded but {} could not be recorded: {}",
            post_id, candidate.identifier, e
        );
        return Err(e);
    }

    Ok(CycleOutcome::Posted {
        identifier: candidate.identifier.clone(),
        post_id,
    })
}

/// Build clients from `config` and run one cycle
pub async fn run_once(config: &Config) -> Result<CycleOutcome> {
    let source = create_source(config)?;
    let platform = create_platform(config)?;
    run_cycle(
        source.as_ref(),
        platform.as_ref(),
        &config.caption,
        &config.state_file,
    )
    .await
}

/// Drive a cycle future, logging any error or panic instead of propagating it
///
/// Returns `None` when the cycle failed.
pub async fn run_guarded<F>(cycle: F) -> Option<CycleOutcome>
where
    F: Future<Output = Result<CycleOutcome>>,
{
    match AssertUnwindSafe(cycle).catch_unwind().await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(e)) => {
            error!(error = ?e, "Cycle failed: {}", e);
            None
        }
        Err(panic) => {
            error!("Cycle panicked: {}", panic_message(panic.as_ref()));
            None
        }
    }
}

/// Run cycles forever, sleeping `config.interval` between them
pub async fn run_loop(config: &Config) {
    info!(
        "Starting loop, posting every {}",
        humantime::format_duration(config.interval)
    );

    loop {
        run_guarded(run_once(config)).await;
        debug!(
            "Sleeping {} until the next cycle",
            humantime::format_duration(config.interval)
        );
        sleep(config.interval).await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
