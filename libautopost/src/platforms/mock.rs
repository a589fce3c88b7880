//! Mock platform implementation for testing
//!
//! This module provides a configurable mock platform that can simulate upload
//! and posting failures as well as panics. It records every upload (with the
//! bytes it read) and every post it accepts, so integration tests can verify
//! a whole cycle without credentials or network access.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;

/// A post accepted by the mock platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPost {
    pub post_id: String,
    pub text: String,
    pub media_ids: Vec<String>,
}

/// An upload accepted by the mock platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockUpload {
    pub media_id: String,
    /// File name of the uploaded media
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name reported in logs
    pub name: String,

    /// Whether uploads should succeed
    pub upload_succeeds: bool,

    /// Whether post creation should succeed
    pub post_succeeds: bool,

    /// Error to return on upload failure
    pub upload_error: Option<PlatformError>,

    /// Error to return on posting failure
    pub post_error: Option<PlatformError>,

    /// Panic inside `create_post` instead of returning
    pub panic_on_post: bool,

    /// Number of times `upload_video` has been called
    pub upload_call_count: Arc<Mutex<usize>>,

    /// Number of times `create_post` has been called
    pub post_call_count: Arc<Mutex<usize>>,

    /// Uploads that have been made (for verification)
    pub uploads: Arc<Mutex<Vec<MockUpload>>>,

    /// Posts that have been made (for verification)
    pub posts: Arc<Mutex<Vec<MockPost>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            upload_succeeds: true,
            post_succeeds: true,
            upload_error: None,
            post_error: None,
            panic_on_post: false,
            upload_call_count: Arc::new(Mutex::new(0)),
            post_call_count: Arc::new(Mutex::new(0)),
            uploads: Arc::new(Mutex::new(Vec::new())),
            posts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    /// Create a new mock platform with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock platform that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// Create a mock platform whose uploads fail
    pub fn upload_failure(error: PlatformError) -> Self {
        Self::new(MockConfig {
            upload_succeeds: false,
            upload_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock platform that uploads but fails to create the post
    pub fn post_failure(error: PlatformError) -> Self {
        Self::new(MockConfig {
            post_succeeds: false,
            post_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock platform that panics while posting
    pub fn panicking() -> Self {
        Self::new(MockConfig {
            panic_on_post: true,
            ..Default::default()
        })
    }

    /// Get the number of times upload_video was called
    pub fn upload_call_count(&self) -> usize {
        *self.config.upload_call_count.lock().unwrap()
    }

    /// Get the number of times create_post was called
    pub fn post_call_count(&self) -> usize {
        *self.config.post_call_count.lock().unwrap()
    }

    /// Get all uploads that have been made
    pub fn uploads(&self) -> Vec<MockUpload> {
        self.config.uploads.lock().unwrap().clone()
    }

    /// Get all posts that have been made
    pub fn posts(&self) -> Vec<MockPost> {
        self.config.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate_media(&self, media: &Path) -> Result<()> {
        if !media.is_file() {
            return Err(PlatformError::Validation(format!(
                "{} does not exist",
                media.display()
            ))
            .into());
        }
        Ok(())
    }

    async fn upload_video(&self, media: &Path) -> Result<String> {
        let count = {
            let mut count = self.config.upload_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if !self.config.upload_succeeds {
            let error = self
                .config
                .upload_error
                .clone()
                .unwrap_or_else(|| PlatformError::Upload("Mock upload failed".to_string()));
            return Err(error.into());
        }

        let contents = tokio::fs::read(media)
            .await
            .map_err(|e| PlatformError::Upload(format!("Mock could not read media: {}", e)))?;
        let media_id = format!("media-{}", count);
        self.config.uploads.lock().unwrap().push(MockUpload {
            media_id: media_id.clone(),
            file_name: media
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            contents,
        });

        Ok(media_id)
    }

    async fn create_post(&self, text: &str, media_ids: &[String]) -> Result<String> {
        let count = {
            let mut count = self.config.post_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if self.config.panic_on_post {
            panic!("mock platform panicked while posting");
        }

        if !self.config.post_succeeds {
            let error = self
                .config
                .post_error
                .clone()
                .unwrap_or_else(|| PlatformError::Posting("Mock posting failed".to_string()));
            return Err(error.into());
        }

        let post_id = format!("mock-{}", count);
        self.config.posts.lock().unwrap().push(MockPost {
            post_id: post_id.clone(),
            text: text.to_string(),
            media_ids: media_ids.to_vec(),
        });

        Ok(post_id)
    }
}
