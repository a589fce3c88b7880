//! Google service-account authentication
//!
//! Exchanges an RS256-signed JWT assertion built from the service account's
//! JSON key for a short-lived bearer token (RFC 7523 JWT bearer grant).

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceError};

/// Read-only Drive scope
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account key file this crate needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct ServiceAccountAuth {
    key_file: PathBuf,
    scope: String,
}

impl ServiceAccountAuth {
    pub fn new(key_file: impl Into<PathBuf>, scope: impl Into<String>) -> Self {
        Self {
            key_file: key_file.into(),
            scope: scope.into(),
        }
    }

    /// Read and parse the key file
    pub fn load_key(&self) -> Result<ServiceAccountKey> {
        let content = std::fs::read_to_string(&self.key_file).map_err(|e| {
            SourceError::Authentication(format!(
                "Failed to read service account file {}: {}",
                self.key_file.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&content).map_err(|e| {
            SourceError::Authentication(format!(
                "Service account file {} is not a valid key: {}",
                self.key_file.display(),
                e
            ))
        })?;
        Ok(key)
    }

    /// Build a signed assertion for `key`, issued at `issued_at` (unix seconds)
    pub fn assertion(&self, key: &ServiceAccountKey, issued_at: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: key.client_email.clone(),
            scope: self.scope.clone(),
            aud: key.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            SourceError::Authentication(format!("Service account private key is unusable: {}", e))
        })?;
        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| SourceError::Authentication(format!("Failed to sign assertion: {}", e)))?;
        Ok(token)
    }

    /// Exchange a fresh assertion for a bearer access token
    ///
    /// The whole exchange must finish within `timeout`.
    pub async fn access_token(&self, client: &Client, timeout: Duration) -> Result<String> {
        let key = self.load_key()?;
        let assertion = self.assertion(&key, Utc::now().timestamp())?;

        tracing::debug!("Requesting Drive access token for {}", key.client_email);

        let response = client
            .post(&key.token_uri)
            .timeout(timeout)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Token response unreadable: {}", e)))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(SourceError::Authentication(format!(
                "Token exchange rejected (HTTP {}): {}",
                status.as_u16(),
                detail
            ))
            .into());
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            SourceError::Authentication(format!("Unexpected token response: {}", e))
        })?;
        Ok(token.access_token)
    }
}
