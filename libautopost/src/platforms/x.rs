//! X (Twitter) platform implementation
//!
//! Videos go through the v1.1 chunked media upload (`INIT`, `APPEND`,
//! `FINALIZE`, then `STATUS` polling while the video is processed) and are
//! posted through the v2 create-post endpoint. Every request is signed with
//! OAuth 1.0a user credentials.
//!
//! Post creation waits out HTTP 429 responses until the rate-limit window
//! resets, a bounded number of times. Upload requests do not.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::time::sleep;

use crate::config::XCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::oauth::OAuth1Signer;
use crate::platforms::Platform;
use crate::types::VideoContainer;

pub const UPLOAD_ENDPOINT: &str = "https://upload.twitter.com/1.1/media/upload.json";
pub const CREATE_POST_ENDPOINT: &str = "https://api.twitter.com/2/tweets";

/// Largest video accepted for `tweet_video` uploads
pub const MAX_VIDEO_BYTES: u64 = 512 * 1024 * 1024;

const CHUNK_SIZE: usize = 4 * 1024 * 1024;
const MEDIA_CATEGORY: &str = "tweet_video";
const FALLBACK_MEDIA_TYPE: &str = "video/mp4";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CHECK_AFTER_SECS: u64 = 5;
const MAX_STATUS_CHECKS: u32 = 120;
const MAX_RATE_LIMIT_WAITS: u32 = 3;
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);

/// Which half of the publish protocol a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Upload,
    Post,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    media_id_string: String,
    #[serde(default)]
    processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Deserialize)]
struct ProcessingInfo {
    state: String,
    #[serde(default)]
    check_after_secs: Option<u64>,
    #[serde(default)]
    progress_percent: Option<u8>,
    #[serde(default)]
    error: Option<ProcessingError>,
}

#[derive(Debug, Deserialize)]
struct ProcessingError {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Serialize)]
struct CreatePostRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    text: &'a str,
    media: PostMedia<'a>,
}

#[derive(Debug, Serialize)]
struct PostMedia<'a> {
    media_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

/// X platform client
pub struct XClient {
    client: Client,
    signer: OAuth1Signer,
    upload_endpoint: String,
    create_post_endpoint: String,
}

impl XClient {
    /// Create a client from OAuth 1.0a credentials
    ///
    /// No request is made; invalid credentials surface on the first upload.
    pub fn new(credentials: &XCredentials) -> Result<Self> {
        Self::with_endpoints(credentials, UPLOAD_ENDPOINT, CREATE_POST_ENDPOINT)
    }

    /// Create a client that uploads to `upload_endpoint` and posts to `create_post_endpoint`
    pub fn with_endpoints(
        credentials: &XCredentials,
        upload_endpoint: impl Into<String>,
        create_post_endpoint: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            signer: OAuth1Signer::new(credentials),
            upload_endpoint: upload_endpoint.into(),
            create_post_endpoint: create_post_endpoint.into(),
        })
    }

    /// Start a request whose signature covers `params` (query or form parameters)
    fn signed(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RequestBuilder> {
        let header = self
            .signer
            .authorization_header(method.as_str(), url, params)?;
        Ok(self
            .client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, header))
    }

    async fn send(&self, request: RequestBuilder, stage: Stage, step: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("X {} request failed: {}", step, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_x_error(status, &body, stage, step).into())
    }

    async fn upload_command(&self, params: Vec<(String, String)>, step: &str) -> Result<Response> {
        let request = self
            .signed(Method::POST, &self.upload_endpoint, &params)?
            .form(&params);
        self.send(request, Stage::Upload, step).await
    }

    async fn init_upload(&self, total_bytes: u64, media_type: &str) -> Result<String> {
        let response = self
            .upload_command(
                vec![
                    ("command".into(), "INIT".into()),
                    ("total_bytes".into(), total_bytes.to_string()),
                    ("media_type".into(), media_type.into()),
                    ("media_category".into(), MEDIA_CATEGORY.into()),
                ],
                "INIT",
            )
            .await?;
        let init: MediaResponse = decode(response, Stage::Upload, "INIT").await?;
        Ok(init.media_id_string)
    }

    async fn append_chunks(&self, media: &Path, media_id: &str) -> Result<()> {
        let mut file = tokio::fs::File::open(media).await.map_err(|e| {
            PlatformError::Validation(format!("Cannot open {}: {}", media.display(), e))
        })?;

        let mut segment_index: u32 = 0;
        loop {
            let chunk = read_chunk(&mut file, CHUNK_SIZE).await.map_err(|e| {
                PlatformError::Upload(format!("Failed reading {}: {}", media.display(), e))
            })?;
            if chunk.is_empty() {
                break;
            }

            let len = chunk.len();
            let form = Form::new()
                .text("command", "APPEND")
                .text("media_id", media_id.to_string())
                .text("segment_index", segment_index.to_string())
                .part("media", Part::bytes(chunk).file_name("chunk"));

            // Multipart bodies are not part of the OAuth signature
            let request = self.signed(Method::POST, &self.upload_endpoint, &[])?.multipart(form);
            self.send(request, Stage::Upload, "APPEND").await?;

            tracing::debug!("Appended segment {} ({} bytes)", segment_index, len);
            segment_index += 1;

            if len < CHUNK_SIZE {
                break;
            }
        }
        Ok(())
    }

    async fn finalize_upload(&self, media_id: &str) -> Result<Option<ProcessingInfo>> {
        let response = self
            .upload_command(
                vec![
                    ("command".into(), "FINALIZE".into()),
                    ("media_id".into(), media_id.into()),
                ],
                "FINALIZE",
            )
            .await?;
        let finalized: MediaResponse = decode(response, Stage::Upload, "FINALIZE").await?;
        Ok(finalized.processing_info)
    }

    async fn check_status(&self, media_id: &str) -> Result<Option<ProcessingInfo>> {
        let params = vec![
            ("command".to_string(), "STATUS".to_string()),
            ("media_id".to_string(), media_id.to_string()),
        ];
        let request = self
            .signed(Method::GET, &self.upload_endpoint, &params)?
            .query(&params);
        let response = self.send(request, Stage::Upload, "STATUS").await?;
        let status: StatusResponse = decode(response, Stage::Upload, "STATUS").await?;
        Ok(status.processing_info)
    }

    /// Poll until server-side processing of the video finishes
    async fn wait_for_processing(&self, media_id: &str, mut info: Option<ProcessingInfo>) -> Result<()> {
        let mut checks = 0;
        while let Some(current) = info {
            match current.state.as_str() {
                "succeeded" => return Ok(()),
                "failed" => {
                    let detail = current
                        .error
                        .and_then(|e| e.message.or(e.name))
                        .unwrap_or_else(|| "no detail given".to_string());
                    return Err(PlatformError::Upload(format!(
                        "X could not process media {}: {}",
                        media_id, detail
                    ))
                    .into());
                }
                state => {
                    if checks >= MAX_STATUS_CHECKS {
                        return Err(PlatformError::Upload(format!(
                            "Media {} still '{}' after {} status checks",
                            media_id, state, checks
                        ))
                        .into());
                    }
                    let wait = current.check_after_secs.unwrap_or(DEFAULT_CHECK_AFTER_SECS).max(1);
                    tracing::debug!(
                        "Media {} is {} ({}%), checking again in {}s",
                        media_id,
                        state,
                        current.progress_percent.unwrap_or(0),
                        wait
                    );
                    sleep(Duration::from_secs(wait)).await;
                    checks += 1;
                    info = self.check_status(media_id).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for XClient {
    fn name(&self) -> &str {
        "x"
    }

    fn validate_media(&self, media: &Path) -> Result<()> {
        let metadata = std::fs::metadata(media).map_err(|e| {
            PlatformError::Validation(format!("Cannot read {}: {}", media.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(PlatformError::Validation(format!("{} is not a file", media.display())).into());
        }
        let size = metadata.len();
        if size == 0 {
            return Err(PlatformError::Validation(format!("{} is empty", media.display())).into());
        }
        if size > MAX_VIDEO_BYTES {
            return Err(PlatformError::Validation(format!(
                "{} is {} bytes, over X's {} byte video limit",
                media.display(),
                size,
                MAX_VIDEO_BYTES
            ))
            .into());
        }
        Ok(())
    }

    async fn upload_video(&self, media: &Path) -> Result<String> {
        let total_bytes = tokio::fs::metadata(media)
            .await
            .map_err(|e| PlatformError::Validation(format!("Cannot read {}: {}", media.display(), e)))?
            .len();
        let media_type = media_type_for(media);

        let media_id = self.init_upload(total_bytes, media_type).await?;
        tracing::debug!("Initialized upload {} ({} bytes, {})", media_id, total_bytes, media_type);

        self.append_chunks(media, &media_id).await?;
        let processing = self.finalize_upload(&media_id).await?;
        self.wait_for_processing(&media_id, processing).await?;

        Ok(media_id)
    }

    async fn create_post(&self, text: &str, media_ids: &[String]) -> Result<String> {
        let body = CreatePostRequest {
            text,
            media: PostMedia { media_ids },
        };

        let mut waits = 0;
        loop {
            // JSON bodies are not part of the OAuth signature
            let request = self
                .signed(Method::POST, &self.create_post_endpoint, &[])?
                .json(&body);
            let response = request
                .send()
                .await
                .map_err(|e| PlatformError::Network(format!("X create post request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && waits < MAX_RATE_LIMIT_WAITS {
                let reset = response
                    .headers()
                    .get("x-rate-limit-reset")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let wait = rate_limit_wait(reset.as_deref(), chrono::Utc::now().timestamp());
                tracing::warn!(
                    "X rate limit reached, waiting {} before retrying",
                    humantime::format_duration(wait)
                );
                sleep(wait).await;
                waits += 1;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(map_x_error(status, &body, Stage::Post, "create post").into());
            }

            let created: CreatePostResponse = decode(response, Stage::Post, "create post").await?;
            return Ok(created.data.id);
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response, stage: Stage, step: &str) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| PlatformError::Network(format!("X {} response unreadable: {}", step, e)))?;
    serde_json::from_str(&body).map_err(|e| {
        let message = format!("Unexpected X {} response: {} ({})", step, e, body.trim());
        match stage {
            Stage::Upload => PlatformError::Upload(message),
            Stage::Post => PlatformError::Posting(message),
        }
        .into()
    })
}

/// Fill a buffer of up to `size` bytes, returning fewer only at end of file
async fn read_chunk(file: &mut tokio::fs::File, size: usize) -> std::io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        let read = file.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    buffer.truncate(filled);
    Ok(buffer)
}

fn media_type_for(media: &Path) -> &'static str {
    VideoContainer::from_path(media)
        .map(|container| container.as_mime_str())
        .unwrap_or(FALLBACK_MEDIA_TYPE)
}

/// How long to sleep after a 429, given the `x-rate-limit-reset` header (unix seconds)
fn rate_limit_wait(reset_header: Option<&str>, now: i64) -> Duration {
    match reset_header.and_then(|value| value.trim().parse::<i64>().ok()) {
        Some(reset) => {
            let secs = reset.saturating_sub(now).max(0) as u64;
            Duration::from_secs(secs.saturating_add(1)).min(MAX_RATE_LIMIT_WAIT)
        }
        None => DEFAULT_RATE_LIMIT_WAIT,
    }
}

/// Pull a human-readable message out of an X error body (v1.1 or v2 shape)
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    value
        .pointer("/errors/0/message")
        .or_else(|| value.get("detail"))
        .or_else(|| value.get("title"))
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Map a non-success X response to a platform error
fn map_x_error(status: StatusCode, body: &str, stage: Stage, step: &str) -> PlatformError {
    let message = error_message(body);
    let code = status.as_u16();

    match code {
        401 | 403 => PlatformError::Authentication(format!(
            "X rejected {} (HTTP {}): {}. \
             Suggestion: Check the consumer key/secret and that the access token has read and write permission.",
            step, code, message
        )),
        400 | 413 | 422 => PlatformError::Validation(format!(
            "X rejected {} (HTTP {}): {}",
            step, code, message
        )),
        429 => PlatformError::RateLimit(format!(
            "X rate limit exceeded during {}: {}",
            step, message
        )),
        500..=599 => PlatformError::Network(format!(
            "X server error during {} (HTTP {}): {}",
            step, code, message
        )),
        _ => {
            let message = format!("X {} failed (HTTP {}): {}", step, code, message);
            match stage {
                Stage::Upload => PlatformError::Upload(message),
                Stage::Post => PlatformError::Posting(message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutopostError;
    use secrecy::SecretString;
    use tempfile::TempDir;

    fn client() -> XClient {
        XClient::new(&XCredentials {
            consumer_key: SecretString::from("ck".to_string()),
            consumer_secret: SecretString::from("cs".to_string()),
            access_token: SecretString::from("at".to_string()),
            access_token_secret: SecretString::from("ats".to_string()),
        })
        .unwrap()
    }

    fn validation_error(result: Result<()>) -> String {
        match result {
            Err(AutopostError::Platform(PlatformError::Validation(msg))) => msg,
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_media_accepts_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.mp4");
        std::fs::write(&path, b"video bytes").unwrap();
        assert!(client().validate_media(&path).is_ok());
    }

    #[test]
    fn test_validate_media_rejects_missing_and_empty() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.mp4");
        assert!(validation_error(client().validate_media(&missing)).contains("Cannot read"));

        let empty = temp_dir.path().join("empty.mp4");
        std::fs::write(&empty, b"").unwrap();
        assert!(validation_error(client().validate_media(&empty)).contains("is empty"));
    }

    #[test]
    fn test_validate_media_rejects_oversized_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("huge.mp4");
        // Sparse file, no real disk usage
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_VIDEO_BYTES + 1).unwrap();

        assert!(validation_error(client().validate_media(&path)).contains("video limit"));
    }

    #[tokio::test]
    async fn test_post_video_rejects_invalid_media_before_network() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.mp4");
        std::fs::write(&empty, b"").unwrap();

        let err = client().post_video(&empty, "caption").await.unwrap_err();
        assert!(matches!(err, AutopostError::Platform(PlatformError::Validation(_))));
    }

    #[tokio::test]
    async fn test_read_chunk_splits_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.mp4");
        std::fs::write(&path, vec![7u8; 10]).unwrap();

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        assert_eq!(read_chunk(&mut file, 4).await.unwrap().len(), 4);
        assert_eq!(read_chunk(&mut file, 4).await.unwrap().len(), 4);
        assert_eq!(read_chunk(&mut file, 4).await.unwrap().len(), 2);
        assert!(read_chunk(&mut file, 4).await.unwrap().is_empty());
    }

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(media_type_for(Path::new("a.MOV")), "video/quicktime");
        assert_eq!(media_type_for(Path::new("downloaded-without-extension")), "video/mp4");
    }

    #[test]
    fn test_rate_limit_wait() {
        assert_eq!(rate_limit_wait(Some("1000"), 940), Duration::from_secs(61));
        // Reset already passed
        assert_eq!(rate_limit_wait(Some("900"), 940), Duration::from_secs(1));
        assert_eq!(rate_limit_wait(None, 940), DEFAULT_RATE_LIMIT_WAIT);
        assert_eq!(rate_limit_wait(Some("soon"), 940), DEFAULT_RATE_LIMIT_WAIT);
    }

    #[test]
    fn test_rate_limit_wait_extreme_reset_values() {
        assert_eq!(
            rate_limit_wait(Some("-9223372036854775808"), 1_700_000_000),
            Duration::from_secs(1)
        );
        assert_eq!(
            rate_limit_wait(Some("9223372036854775807"), -1_700_000_000),
            MAX_RATE_LIMIT_WAIT
        );
        assert_eq!(
            rate_limit_wait(Some("1700003600"), 1_700_000_000),
            MAX_RATE_LIMIT_WAIT
        );
    }

    #[test]
    fn test_create_post_body_shape() {
        let ids = vec!["710511363345354753".to_string()];
        let body = CreatePostRequest {
            text: "New clip",
            media: PostMedia { media_ids: &ids },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"text": "New clip", "media": {"media_ids": ["710511363345354753"]}})
        );
    }

    #[test]
    fn test_create_post_body_omits_empty_text() {
        let ids = vec!["1".to_string()];
        let body = CreatePostRequest {
            text: "",
            media: PostMedia { media_ids: &ids },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"media": {"media_ids": ["1"]}})
        );
    }

    #[test]
    fn test_media_response_with_processing_info() {
        let body = r#"{
            "media_id": 710511363345354753,
            "media_id_string": "710511363345354753",
            "size": 11065,
            "expires_after_secs": 86400,
            "processing_info": {"state": "pending", "check_after_secs": 5}
        }"#;
        let response: MediaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.media_id_string, "710511363345354753");
        let info = response.processing_info.unwrap();
        assert_eq!(info.state, "pending");
        assert_eq!(info.check_after_secs, Some(5));
    }

    #[tokio::test]
    async fn test_processing_already_finished_needs_no_polling() {
        let client = client();
        assert!(client.wait_for_processing("1", None).await.is_ok());

        let succeeded = ProcessingInfo {
            state: "succeeded".into(),
            check_after_secs: None,
            progress_percent: Some(100),
            error: None,
        };
        assert!(client.wait_for_processing("1", Some(succeeded)).await.is_ok());
    }

    #[tokio::test]
    async fn test_processing_failure_is_upload_error() {
        let failed = ProcessingInfo {
            state: "failed".into(),
            check_after_secs: None,
            progress_percent: None,
            error: Some(ProcessingError {
                name: Some("InvalidMedia".into()),
                message: Some("Unsupported video codec".into()),
            }),
        };
        let err = client().wait_for_processing("42", Some(failed)).await.unwrap_err();
        match err {
            AutopostError::Platform(PlatformError::Upload(msg)) => {
                assert!(msg.contains("Unsupported video codec"));
                assert!(msg.contains("42"));
            }
            other => panic!("Expected Upload error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"errors":[{"code":324,"message":"Invalid media id"}]}"#),
            "Invalid media id"
        );
        assert_eq!(
            error_message(r#"{"title":"Forbidden","detail":"You are not permitted to perform this action.","type":"about:blank","status":403}"#),
            "You are not permitted to perform this action."
        );
        assert_eq!(error_message(r#"{"error":"InvalidContent"}"#), "InvalidContent");
        assert_eq!(error_message("<html>Bad Gateway</html>"), "<html>Bad Gateway</html>");
    }

    #[test]
    fn test_map_x_error_by_status() {
        let auth = map_x_error(StatusCode::UNAUTHORIZED, "{}", Stage::Upload, "INIT");
        assert!(matches!(auth, PlatformError::Authentication(ref m) if m.contains("Suggestion")));

        let validation = map_x_error(StatusCode::BAD_REQUEST, "", Stage::Upload, "APPEND");
        assert!(matches!(validation, PlatformError::Validation(_)));

        let rate = map_x_error(StatusCode::TOO_MANY_REQUESTS, "", Stage::Post, "create post");
        assert!(matches!(rate, PlatformError::RateLimit(_)));

        let server = map_x_error(StatusCode::SERVICE_UNAVAILABLE, "", Stage::Post, "create post");
        assert!(matches!(server, PlatformError::Network(_)));
    }

    #[test]
    fn test_map_x_error_other_status_follows_stage() {
        let upload = map_x_error(StatusCode::NOT_FOUND, "", Stage::Upload, "STATUS");
        assert!(matches!(upload, PlatformError::Upload(ref m) if m.contains("404")));

        let post = map_x_error(StatusCode::CONFLICT, "", Stage::Post, "create post");
        assert!(matches!(post, PlatformError::Posting(ref m) if m.contains("409")));
    }
}
