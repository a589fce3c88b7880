//! autopost - Publish videos from a folder to X on a fixed interval
//!
//! Picks the oldest video that has not been posted yet, uploads it to X
//! with a caption, and records it so it is never posted twice.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use libautopost::logging::{resolve_format, LogFormat, LogLevel, LoggingConfig};
use libautopost::{run_guarded, run_loop, run_once, Config, CycleOutcome, Overrides};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "autopost")]
#[command(version)]
#[command(about = "Post the oldest unposted video from a folder to X")]
#[command(long_about = "\
autopost - Publish videos from a folder to X on a fixed interval

DESCRIPTION:
    autopost lists a Google Drive folder or a local folder, picks the oldest
    video that has not been posted yet, uploads it to X with a caption, and
    records it in a JSON state file so it is never posted twice.

    Without --run-once it keeps running, posting at most one video per
    interval. Failed cycles are logged and retried on the next interval.

USAGE:
    # Post one video and exit
    autopost --run-once

    # Post every 6 hours
    autopost --interval 21600

    # Local folder with a fixed caption
    LOCAL_VIDEO_FOLDER=~/videos autopost --caption \"New upload!\"

ENVIRONMENT:
    LOCAL_VIDEO_FOLDER            Local folder to post from (selects local mode)
    GOOGLE_DRIVE_FOLDER_ID        Drive folder to post from
    GOOGLE_SERVICE_ACCOUNT_FILE   Service account JSON key for Drive
    TWITTER_CONSUMER_KEY          X API key
    TWITTER_CONSUMER_SECRET       X API key secret
    TWITTER_ACCESS_TOKEN          X access token
    TWITTER_ACCESS_TOKEN_SECRET   X access token secret
    TWEET_TEMPLATE                Drive caption, supports {filename} and {file_id}
    POST_CAPTION                  Local caption (default: empty)
    STATE_FILE                    State file path (default: .autopost_state.json)
    POST_INTERVAL_SECONDS         Seconds between posts (default: 86400)
    AUTOPOST_LOG_FORMAT           text, json or pretty (default: text)

EXIT CODES:
    0 - Cycle finished (posted, nothing to post, or cycle failure logged)
    1 - Configuration error
    2 - Invalid command-line arguments
")]
struct Cli {
    /// Run a single cycle and exit
    #[arg(long)]
    run_once: bool,

    /// Seconds between cycles (overrides POST_INTERVAL_SECONDS)
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Path of the JSON state file (overrides STATE_FILE)
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Caption for local folder posts (overrides POST_CAPTION)
    #[arg(long, value_name = "TEXT")]
    caption: Option<String>,

    /// Log verbosity: debug, info, warning, error
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Log output format: text, json, pretty (overrides AUTOPOST_LOG_FORMAT)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    LoggingConfig::new(resolve_format(cli.log_format), cli.log_level).init();

    let overrides = Overrides {
        interval_seconds: cli.interval,
        state_file: cli.state_file,
        caption: cli.caption,
    };

    let config = match Config::from_env(&overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    info!(
        "autopost starting ({} source, state file {})",
        config.source.name(),
        config.state_file.display()
    );

    if cli.run_once {
        match run_guarded(run_once(&config)).await {
            Some(CycleOutcome::Posted { identifier, post_id }) => {
                info!("Posted {} as {}", identifier, post_id);
            }
            Some(CycleOutcome::NothingToDo) => info!("Nothing to post"),
            None => info!("Cycle failed, see errors above"),
        }
        return ExitCode::SUCCESS;
    }

    run_loop(&config).await;
    ExitCode::SUCCESS
}
