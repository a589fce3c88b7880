//! Local stand-in for the Drive and X HTTP APIs
//!
//! Serves the token, listing, download, chunked-upload and create-post
//! routes on an ephemeral port and records every request it receives.

// Not every test file uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use libautopost::config::XCredentials;
use libautopost::platforms::x::XClient;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const UPLOAD_PATH: &str = "/1.1/media/upload.json";
pub const CREATE_POST_PATH: &str = "/2/tweets";
pub const DRIVE_PATH: &str = "/drive/v3";
pub const TOKEN_PATH: &str = "/token";

pub const MEDIA_ID: &str = "710511363345354753";
pub const POST_ID: &str = "1850000000000000001";
pub const DRIVE_TOKEN: &str = "drive-access-token";

/// One request seen by the fake server
#[derive(Debug, Clone, Default)]
pub struct Call {
    /// `token`, `list`, `download`, `INIT`, `APPEND`, `FINALIZE`, `STATUS` or `post`
    pub step: String,
    /// Form fields, multipart text fields or query parameters
    pub params: HashMap<String, String>,
    pub authorization: Option<String>,
    /// Size of the `media` part of an APPEND
    pub media_len: usize,
    /// Body of a create-post request
    pub json: Option<Value>,
}

/// Canned behavior for the fake server
#[derive(Debug, Clone, Default)]
pub struct FakeApiConfig {
    /// Files returned by the Drive listing, in Drive's JSON shape
    pub drive_files: Vec<Value>,
    /// Download bodies keyed by Drive file id
    pub drive_contents: HashMap<String, Vec<u8>>,
    /// FINALIZE reports `pending` processing, and STATUS then reports `succeeded`
    pub processing: bool,
    /// Number of create-post requests answered with HTTP 429 before one succeeds
    pub rate_limited_posts: usize,
}

#[derive(Clone)]
pub struct FakeApi {
    pub base: String,
    config: Arc<FakeApiConfig>,
    calls: Arc<Mutex<Vec<Call>>>,
    rate_limited_left: Arc<Mutex<usize>>,
}

impl FakeApi {
    /// Bind an ephemeral port and start serving in the background
    pub async fn start(config: FakeApiConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let api = Self {
            base: format!("http://{}", addr),
            rate_limited_left: Arc::new(Mutex::new(config.rate_limited_posts)),
            config: Arc::new(config),
            calls: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route(UPLOAD_PATH, post(upload_command).get(upload_status))
            .route(CREATE_POST_PATH, post(create_post))
            .route(TOKEN_PATH, post(token))
            .route("/drive/v3/files", get(list_files))
            .route("/drive/v3/files/{id}", get(download_file))
            .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
            .with_state(api.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        api
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.step).collect()
    }

    pub fn calls_for(&self, step: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.step == step)
            .collect()
    }

    pub fn x_client(&self) -> XClient {
        XClient::with_endpoints(
            &credentials(),
            format!("{}{}", self.base, UPLOAD_PATH),
            format!("{}{}", self.base, CREATE_POST_PATH),
        )
        .unwrap()
    }

    pub fn drive_base(&self) -> String {
        format!("{}{}", self.base, DRIVE_PATH)
    }

    pub fn token_uri(&self) -> String {
        format!("{}{}", self.base, TOKEN_PATH)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn credentials() -> XCredentials {
    XCredentials {
        consumer_key: SecretString::from("ck".to_string()),
        consumer_secret: SecretString::from("cs".to_string()),
        access_token: SecretString::from("at".to_string()),
        access_token_secret: SecretString::from("ats".to_string()),
    }
}

/// Write a service-account key that exchanges tokens at `token_uri`
pub fn write_service_account(dir: &Path, token_uri: &str) -> PathBuf {
    let key = json!({
        "type": "service_account",
        "client_email": "autopost@example.iam.gserviceaccount.com",
        "private_key": include_str!("../fixtures/test_rsa_key.pem"),
        "token_uri": token_uri,
    });
    let path = dir.join("service_account.json");
    std::fs::write(&path, key.to_string()).unwrap();
    path
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn media_response(processing: Option<Value>) -> Response {
    let mut body = json!({
        "media_id": 710511363345354753u64,
        "media_id_string": MEDIA_ID,
        "expires_after_secs": 86400,
    });
    if let Some(info) = processing {
        body["processing_info"] = info;
    }
    Json(body).into_response()
}

/// INIT and FINALIZE arrive form-encoded, APPEND as multipart
async fn upload_command(State(api): State<FakeApi>, request: Request) -> Response {
    let auth = authorization(request.headers());
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = match Multipart::from_request(request, &api).await {
            Ok(multipart) => multipart,
            Err(rejection) => return rejection.into_response(),
        };
        let mut params = HashMap::new();
        let mut media_len = 0;
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            if name == "media" {
                media_len = field.bytes().await.map(|bytes| bytes.len()).unwrap_or(0);
            } else {
                params.insert(name, field.text().await.unwrap_or_default());
            }
        }
        api.record(Call {
            step: "APPEND".into(),
            params,
            authorization: auth,
            media_len,
            json: None,
        });
        return StatusCode::NO_CONTENT.into_response();
    }

    let Form(params) = match Form::<HashMap<String, String>>::from_request(request, &api).await {
        Ok(form) => form,
        Err(rejection) => return rejection.into_response(),
    };
    let command = params.get("command").cloned().unwrap_or_default();
    api.record(Call {
        step: command.clone(),
        params,
        authorization: auth,
        ..Default::default()
    });

    match command.as_str() {
        "INIT" => media_response(None),
        "FINALIZE" if api.config.processing => media_response(Some(json!({
            "state": "pending",
            "check_after_secs": 1,
        }))),
        "FINALIZE" => media_response(None),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"errors": [{"code": 38, "message": "command parameter is missing"}]})),
        )
            .into_response(),
    }
}

async fn upload_status(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    api.record(Call {
        step: "STATUS".into(),
        params,
        authorization: authorization(&headers),
        ..Default::default()
    });
    media_response(Some(json!({"state": "succeeded", "progress_percent": 100})))
}

async fn create_post(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.record(Call {
        step: "post".into(),
        authorization: authorization(&headers),
        json: Some(body.clone()),
        ..Default::default()
    });

    {
        let mut left = api.rate_limited_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            let reset = chrono::Utc::now().timestamp().to_string();
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [("x-rate-limit-reset", reset)],
                Json(json!({"title": "Too Many Requests", "status": 429})),
            )
                .into_response();
        }
    }

    let text = body["text"].clone();
    (
        StatusCode::CREATED,
        Json(json!({"data": {"id": POST_ID, "text": text}})),
    )
        .into_response()
}

async fn token(
    State(api): State<FakeApi>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    api.record(Call {
        step: "token".into(),
        params,
        ..Default::default()
    });
    Json(json!({
        "access_token": DRIVE_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn list_files(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    api.record(Call {
        step: "list".into(),
        params,
        authorization: authorization(&headers),
        ..Default::default()
    });
    Json(json!({"files": api.config.drive_files})).into_response()
}

async fn download_file(
    State(api): State<FakeApi>,
    axum::extract::Path(id): axum::extract::Path<String>,
    headers: HeaderMap,
    Query(mut params): Query<HashMap<String, String>>,
) -> Response {
    params.insert("id".into(), id.clone());
    api.record(Call {
        step: "download".into(),
        params,
        authorization: authorization(&headers),
        ..Default::default()
    });

    match api.config.drive_contents.get(&id) {
        Some(contents) => contents.clone().into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": 404, "message": format!("File not found: {}.", id)}})),
        )
            .into_response(),
    }
}
