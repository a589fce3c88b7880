//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Only parameters that travel as query string or urlencoded form body take
//! part in the signature; multipart and JSON bodies are not signed.

use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

use crate::config::XCredentials;
use crate::error::{PlatformError, Result};

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters are the only ones left unescaped
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, OAUTH_ENCODE_SET).to_string()
}

/// Build the signature base string: `METHOD&url&sorted-params`, each part encoded
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&parameter_string)
    )
}

/// HMAC-SHA1 of `base_string`, base64 encoded
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| PlatformError::Authentication(format!("Invalid signing key: {}", e)))?;
    mac.update(base_string.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub struct OAuth1Signer {
    consumer_key: SecretString,
    consumer_secret: SecretString,
    token: SecretString,
    token_secret: SecretString,
}

impl OAuth1Signer {
    pub fn new(credentials: &XCredentials) -> Self {
        let copy = |secret: &SecretString| SecretString::from(secret.expose_secret().to_owned());
        Self {
            consumer_key: copy(&credentials.consumer_key),
            consumer_secret: copy(&credentials.consumer_secret),
            token: copy(&credentials.access_token),
            token_secret: copy(&credentials.access_token_secret),
        }
    }

    /// `Authorization` header value for a request, with a fresh nonce and timestamp
    ///
    /// `url` must not carry a query string; pass query and form parameters in `params`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params = vec![
            (
                "oauth_consumer_key".to_string(),
                self.consumer_key.expose_secret().to_string(),
            ),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.expose_secret().to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut all_params = oauth_params.clone();
        all_params.extend_from_slice(params);

        let base_string = signature_base_string(method, url, &all_params);
        let signature = sign(
            &base_string,
            self.consumer_secret.expose_secret(),
            self.token_secret.expose_secret(),
        )?;

        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", fields))
    }
}
