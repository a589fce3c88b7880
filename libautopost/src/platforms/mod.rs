//! Publishing platform abstraction and implementations
//!
//! Publishing a video is a two-step protocol: upload the media to obtain a
//! handle, then create a post that references it. A post only counts as
//! published when both steps succeed and the platform returns an identifier.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use libautopost::platforms::{x::XClient, Platform};
//! use libautopost::config::{Config, Overrides};
//!
//! # async fn example() -> libautopost::error::Result<()> {
//! let config = Config::from_env(&Overrides::default())?;
//! let client = XClient::new(&config.x)?;
//!
//! let post_id = client
//!     .post_video(Path::new("/srv/videos/clip.mp4"), "New clip!")
//!     .await?;
//! println!("Posted: {}", post_id);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;

pub mod oauth;
pub mod x;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Lowercase identifier for logs (e.g., "x")
    fn name(&self) -> &str;

    /// Reject media the platform will never accept, before any upload starts
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Validation` if the file is missing, empty, or too large.
    fn validate_media(&self, media: &Path) -> Result<()>;

    /// Upload a video and return the platform's media handle
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Upload` (or a more specific variant) if any
    /// upload step fails or the platform cannot process the media.
    async fn upload_video(&self, media: &Path) -> Result<String>;

    /// Create a post referencing previously uploaded media
    ///
    /// # Returns
    ///
    /// The platform-specific post ID
    async fn create_post(&self, text: &str, media_ids: &[String]) -> Result<String>;

    /// Upload `media` and post it with `text`
    ///
    /// Fails as a whole if either step fails; no partial result is returned.
    async fn post_video(&self, media: &Path, text: &str) -> Result<String> {
        self.validate_media(media)?;

        let media_id = self.upload_video(media).await?;
        tracing::debug!("Uploaded {} to {} as media {}", media.display(), self.name(), media_id);

        self.create_post(text, &[media_id]).await
    }
}

/// Build the publishing client from configuration
///
/// Construction performs no network calls; credentials are checked by the
/// first request.
pub fn create_platform(config: &Config) -> Result<Box<dyn Platform>> {
    Ok(Box::new(x::XClient::new(&config.x)?))
}
