//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Produces the `Authorization` header value for each publish call. Every
//! header carries a fresh timestamp and nonce, so two calls for the same
//! request never produce the same signature. Both sources are injectable
//! through [`Clock`] and [`NonceSource`] to make signing reproducible in tests.
//!
//! # Examples
//!
//! ```no_run
//! use libnewsthread::signer::{Signer, SigningCredentials};
//! use secrecy::SecretString;
//!
//! # fn example() -> libnewsthread::Result<()> {
//! let signer = Signer::new(SigningCredentials {
//!     consumer_key: "key".to_string(),
//!     consumer_secret: SecretString::from("secret".to_string()),
//!     access_token: "token".to_string(),
//!     token_secret: SecretString::from("token-secret".to_string()),
//! });
//!
//! let header = signer.authorization_header("POST", "https://api.twitter.com/2/tweets", &[])?;
//! assert!(header.starts_with("OAuth "));
//! # Ok(())
//! # }
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use std::sync::Arc;

use crate::error::{ConfigError, Result};

type HmacSha1 = Hmac<Sha1>;

/// Scheme label at the start of every header
pub const AUTH_SCHEME: &str = "OAuth";
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";
pub const NONCE_LENGTH: usize = 32;

/// Everything outside the RFC 3986 unreserved set is escaped, including
/// `!`, `'`, `(`, `)` and `*`.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Source of the protocol timestamp
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds
    fn unix_timestamp(&self) -> i64;
}

/// Source of per-request nonces
pub trait NonceSource: Send + Sync {
    fn nonce(&self) -> String;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// 32 characters drawn uniformly from `[A-Za-z0-9]`
pub struct RandomNonce;

impl NonceSource for RandomNonce {
    fn nonce(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LENGTH)
            .map(char::from)
            .collect()
    }
}

/// Consumer and access-token credentials for the signed-request protocol
pub struct SigningCredentials {
    pub consumer_key: String,
    pub consumer_secret: SecretString,
    pub access_token: String,
    pub token_secret: SecretString,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &self.access_token)
            .field("token_secret", &"[REDACTED]")
            .finish()
    }
}

/// Percent-encode a value per RFC 3986 as the protocol requires
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Build the signature base string `METHOD&enc(url)&enc(sorted params)`
///
/// Parameters are encoded, then sorted by encoded key (ties by encoded value).
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}

/// HMAC-SHA1 of the base string under `enc(consumer_secret)&enc(token_secret)`, base64
pub fn compute_signature(base_string: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let signing_key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes()).map_err(|e| ConfigError::InvalidValue {
        field: "signing key".to_string(),
        reason: e.to_string(),
    })?;
    mac.update(base_string.as_bytes());

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

pub struct Signer {
    credentials: SigningCredentials,
    clock: Arc<dyn Clock>,
    nonces: Arc<dyn NonceSource>,
}

impl Signer {
    /// Create a signer using the system clock and random nonces
    pub fn new(credentials: SigningCredentials) -> Self {
        Self::with_sources(credentials, Arc::new(SystemClock), Arc::new(RandomNonce))
    }

    /// Create a signer with explicit time and nonce sources
    pub fn with_sources(
        credentials: SigningCredentials,
        clock: Arc<dyn Clock>,
        nonces: Arc<dyn NonceSource>,
    ) -> Self {
        Self {
            credentials,
            clock,
            nonces,
        }
    }

    /// Produce the `Authorization` header value for one request
    ///
    /// `extra_params` are request parameters that take part in the signature
    /// (query or form parameters); JSON bodies are not signed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if any credential is empty.
    pub fn authorization_header(&self, method: &str, url: &str, extra_params: &[(&str, &str)]) -> Result<String> {
        self.ensure_credentials()?;

        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.credentials.consumer_key.clone()),
            ("oauth_token".to_string(), self.credentials.access_token.clone()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), self.clock.unix_timestamp().to_string()),
            ("oauth_nonce".to_string(), self.nonces.nonce()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        params.extend(extra_params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let base_string = signature_base_string(method, url, &params);
        let signature = compute_signature(
            &base_string,
            self.credentials.consumer_secret.expose_secret(),
            self.credentials.token_secret.expose_secret(),
        )?;
        params.push(("oauth_signature".to_string(), signature));

        let rendered = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("{} {}", AUTH_SCHEME, rendered))
    }

    fn ensure_credentials(&self) -> Result<()> {
        let checks = [
            ("x.consumer_key", self.credentials.consumer_key.is_empty()),
            ("x.consumer_secret", self.credentials.consumer_secret.expose_secret().is_empty()),
            ("x.access_token", self.credentials.access_token.is_empty()),
            ("x.access_token_secret", self.credentials.token_secret.expose_secret().is_empty()),
        ];

        for (field, missing) in checks {
            if missing {
                return Err(ConfigError::MissingField(field.to_string()).into());
            }
        }
        Ok(())
    }
}
