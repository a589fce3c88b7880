//! Drive source tests against a local HTTP server
//!
//! The service-account key points its `token_uri` at the local server, so
//! the token exchange, listing and download all run over real HTTP.

mod common;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use common::{write_service_account, FakeApi, FakeApiConfig, DRIVE_TOKEN, MEDIA_ID, POST_ID};
use libautopost::caption::{Caption, CaptionTemplate};
use libautopost::error::{AutopostError, SourceError};
use libautopost::sources::drive::DriveSource;
use libautopost::sources::{VideoSource, DRIVE_LEDGER_KEY};
use libautopost::{run_cycle, CycleOutcome, Ledger};
use serde_json::json;
use tempfile::TempDir;

const FOLDER_ID: &str = "1FolderAbC";

fn drive_config() -> FakeApiConfig {
    FakeApiConfig {
        drive_files: vec![
            json!({
                "id": "older",
                "name": "holiday",
                "mimeType": "video/quicktime",
                "createdTime": "2024-03-01T09:00:00.000Z"
            }),
            json!({
                "id": "newer",
                "name": "launch.mp4",
                "mimeType": "video/mp4",
                "createdTime": "2024-03-02T09:00:00.000Z"
            }),
        ],
        drive_contents: HashMap::from([
            ("older".to_string(), b"quicktime bytes".to_vec()),
            ("newer".to_string(), b"mp4 bytes".to_vec()),
        ]),
        ..Default::default()
    }
}

fn drive_source(api: &FakeApi, dir: &Path) -> DriveSource {
    let key = write_service_account(dir, &api.token_uri());
    DriveSource::with_base(
        FOLDER_ID.to_string(),
        key,
        api.drive_base(),
        Duration::from_secs(10),
    )
    .unwrap()
}

fn posted_ids(path: &Path) -> Vec<String> {
    Ledger::load(path, DRIVE_LEDGER_KEY)
        .unwrap()
        .posted()
        .iter()
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_listing_request_and_candidates() {
    let api = FakeApi::start(drive_config()).await;
    let temp_dir = TempDir::new().unwrap();
    let source = drive_source(&api, temp_dir.path());

    let candidates = source.list().await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|c| c.identifier.as_str()).collect();
    assert_eq!(ids, vec!["older", "newer"]);
    assert_eq!(candidates[0].mime_type.as_deref(), Some("video/quicktime"));

    let token = &api.calls_for("token")[0];
    assert_eq!(
        token.params["grant_type"],
        "urn:ietf:params:oauth:grant-type:jwt-bearer"
    );
    assert_eq!(token.params["assertion"].split('.').count(), 3);

    let list = &api.calls_for("list")[0];
    assert_eq!(
        list.authorization.as_deref(),
        Some(format!("Bearer {}", DRIVE_TOKEN).as_str())
    );
    assert_eq!(
        list.params["q"],
        "'1FolderAbC' in parents and trashed = false and mimeType contains 'video/'"
    );
    assert_eq!(list.params["fields"], "files(id,name,mimeType,createdTime)");
    assert_eq!(list.params["orderBy"], "createdTime");
    assert_eq!(list.params["pageSize"], "100");
    assert_eq!(list.params["supportsAllDrives"], "true");
    assert_eq!(list.params["includeItemsFromAllDrives"], "true");
}

#[tokio::test]
async fn test_download_names_file_after_listed_type() {
    let api = FakeApi::start(drive_config()).await;
    let temp_dir = TempDir::new().unwrap();
    let source = drive_source(&api, temp_dir.path());

    let candidates = source.list().await.unwrap();
    let media = source.fetch(&candidates[0]).await.unwrap();

    assert_eq!(media.path().file_name().unwrap(), "holiday.mov");
    assert_eq!(std::fs::read(media.path()).unwrap(), b"quicktime bytes");

    let download = &api.calls_for("download")[0];
    assert_eq!(download.params["id"], "older");
    assert_eq!(download.params["alt"], "media");
    assert_eq!(download.params["supportsAllDrives"], "true");
    assert!(download.authorization.as_deref().unwrap().starts_with("Bearer "));

    // One token exchange serves both requests
    assert_eq!(api.calls_for("token").len(), 1);

    let scratch = media.scratch_dir().unwrap().to_path_buf();
    drop(media);
    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_download_of_missing_file_is_download_error() {
    let api = FakeApi::start(FakeApiConfig {
        drive_files: vec![json!({"id": "gone", "name": "gone.mp4", "mimeType": "video/mp4"})],
        ..Default::default()
    })
    .await;
    let temp_dir = TempDir::new().unwrap();
    let source = drive_source(&api, temp_dir.path());

    let candidates = source.list().await.unwrap();
    let err = source.fetch(&candidates[0]).await.unwrap_err();
    match err {
        AutopostError::Source(SourceError::Download(msg)) => {
            assert!(msg.contains("404"));
            assert!(msg.contains("File not found"));
        }
        other => panic!("Expected Download error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_token_endpoint_times_out() {
    // Connections complete in the backlog but nothing ever answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let temp_dir = TempDir::new().unwrap();
    let key = write_service_account(temp_dir.path(), &format!("{}/token", base));
    let source = DriveSource::with_base(
        FOLDER_ID.to_string(),
        key,
        format!("{}/drive/v3", base),
        Duration::from_millis(500),
    )
    .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), source.list())
        .await
        .expect("listing should give up on its own");
    assert!(matches!(
        result,
        Err(AutopostError::Source(SourceError::Network(_)))
    ));
    drop(listener);
}

#[tokio::test]
async fn test_cycle_posts_oldest_drive_video_to_x() {
    let api = FakeApi::start(drive_config()).await;
    let temp_dir = TempDir::new().unwrap();
    let source = drive_source(&api, temp_dir.path());
    let platform = api.x_client();
    let caption = Caption::Template(CaptionTemplate::parse("New: {filename} ({file_id})").unwrap());
    let state = temp_dir.path().join("autopost_state.json");

    let outcome = run_cycle(&source, &platform, &caption, &state).await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Posted {
            identifier: "older".into(),
            post_id: POST_ID.into()
        }
    );
    assert_eq!(posted_ids(&state), vec!["older"]);

    // Extension-less name, so the listed MIME type decides the upload type
    let init = &api.calls_for("INIT")[0];
    assert_eq!(init.params["media_type"], "video/quicktime");
    assert_eq!(init.params["total_bytes"], "15");
    assert_eq!(api.calls_for("APPEND")[0].media_len, 15);

    let post = api.calls_for("post").remove(0);
    assert_eq!(
        post.json.unwrap(),
        json!({"text": "New: holiday (older)", "media": {"media_ids": [MEDIA_ID]}})
    );
}
