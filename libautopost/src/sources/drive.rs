//! Google Drive folder source
//!
//! Lists non-trashed video files in one folder through the Drive v3 API,
//! oldest `createdTime` first, and streams the chosen file into a scratch
//! directory. Only the first page (100 items) is read.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

use crate::error::{Result, SourceError};
use crate::sources::google_auth::{ServiceAccountAuth, DRIVE_READONLY_SCOPE};
use crate::sources::{media_file_name, scratch_dir, FetchedMedia, VideoSource, DRIVE_LEDGER_KEY};
use crate::types::VideoCandidate;

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Limit for token and listing requests, and for silence during a download
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const LIST_FIELDS: &str = "files(id,name,mimeType,createdTime)";
const PAGE_SIZE: &str = "100";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    created_time: Option<DateTime<Utc>>,
}

impl From<DriveFile> for VideoCandidate {
    fn from(file: DriveFile) -> Self {
        VideoCandidate {
            identifier: file.id.clone(),
            display_name: file.name,
            location_hint: file.id,
            mime_type: file.mime_type,
            created_at: file.created_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct DriveSource {
    client: Client,
    api_base: String,
    folder_id: String,
    auth: ServiceAccountAuth,
    timeout: Duration,
    token: OnceCell<String>,
}

impl DriveSource {
    /// Create a Drive source for `folder_id`
    ///
    /// The service account file is not read until the first API call.
    pub fn new(folder_id: String, service_account_file: PathBuf) -> Result<Self> {
        Self::with_base(folder_id, service_account_file, DRIVE_API_BASE, REQUEST_TIMEOUT)
    }

    /// Create a Drive source talking to `api_base` (the `/drive/v3` root)
    ///
    /// `timeout` bounds the token exchange and listing as a whole, and any
    /// stall while a download streams in.
    pub fn with_base(
        folder_id: String,
        service_account_file: PathBuf,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .read_timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            folder_id,
            auth: ServiceAccountAuth::new(service_account_file, DRIVE_READONLY_SCOPE),
            timeout,
            token: OnceCell::new(),
        })
    }

    /// Bearer token, fetched once per source instance
    async fn bearer(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| self.auth.access_token(&self.client, self.timeout))
            .await?;
        Ok(token.as_str())
    }
}

/// Drive search query for videos directly inside `folder_id`
pub fn list_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "'{}' in parents and trashed = false and mimeType contains 'video/'",
        escaped
    )
}

fn map_drive_error(status: StatusCode, body: &str, context: &str) -> SourceError {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status.as_u16() {
        401 | 403 => SourceError::Authentication(format!(
            "Drive rejected credentials during {} (HTTP {}): {}. \
             Suggestion: Share the folder with the service account email.",
            context,
            status.as_u16(),
            message
        )),
        _ if context == "download" => {
            SourceError::Download(format!("HTTP {}: {}", status.as_u16(), message))
        }
        _ => SourceError::Listing(format!("HTTP {}: {}", status.as_u16(), message)),
    }
}

#[async_trait]
impl VideoSource for DriveSource {
    fn name(&self) -> &str {
        "drive"
    }

    fn ledger_key(&self) -> &str {
        DRIVE_LEDGER_KEY
    }

    async fn list(&self) -> Result<Vec<VideoCandidate>> {
        let token = self.bearer().await?;
        let query = list_query(&self.folder_id);

        let response = self
            .client
            .get(format!("{}/files", self.api_base))
            .bearer_auth(token)
            .timeout(self.timeout)
            .query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("orderBy", "createdTime"),
                ("pageSize", PAGE_SIZE),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Drive listing request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Drive listing unreadable: {}", e)))?;
        if !status.is_success() {
            return Err(map_drive_error(status, &body, "listing").into());
        }

        let list: FileList = serde_json::from_str(&body)
            .map_err(|e| SourceError::Listing(format!("Unexpected listing response: {}", e)))?;

        tracing::debug!(
            "Drive folder {} has {} video(s)",
            self.folder_id,
            list.files.len()
        );
        Ok(list.files.into_iter().map(VideoCandidate::from).collect())
    }

    async fn fetch(&self, candidate: &VideoCandidate) -> Result<FetchedMedia> {
        let token = self.bearer().await?;
        let scratch = scratch_dir()?;
        let path = scratch.path().join(media_file_name(candidate));

        let response = self
            .client
            .get(format!("{}/files/{}", self.api_base, candidate.location_hint))
            .bearer_auth(token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Drive download request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_drive_error(status, &body, "download").into());
        }

        let mut file = tokio::fs::File::create(&path).await.map_err(SourceError::Io)?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| SourceError::Download(format!("Download interrupted: {}", e)))?;
            file.write_all(&chunk).await.map_err(SourceError::Io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(SourceError::Io)?;

        tracing::debug!("Downloaded {} bytes to {}", written, path.display());
        Ok(FetchedMedia::downloaded(path, scratch))
    }
}
