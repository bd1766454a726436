//! X (Twitter) platform implementation
//!
//! Posts through the v2 `POST /2/tweets` endpoint with OAuth 1.0a user
//! context signing. The request body is JSON, so only the OAuth protocol
//! parameters take part in the signature.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, X_SERVICE};
use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::signer::Signer;

/// Characters allowed in a single post
pub const X_CHARACTER_LIMIT: usize = 280;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CreatePostRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplySettings<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplySettings<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

pub struct XClient {
    client: reqwest::Client,
    endpoint: String,
    signer: Signer,
}

impl XClient {
    /// Create a client posting to `endpoint` (the full `/2/tweets` URL)
    pub fn new(endpoint: impl Into<String>, signer: Signer) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            signer,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let signer = Signer::new(config.signing_credentials()?);
        Self::new(config.x.endpoint.clone(), signer)
    }
}

#[async_trait]
impl Platform for XClient {
    async fn post(&self, content: &str, reply_to: Option<&str>) -> Result<String> {
        self.validate_content(content)?;

        let body = CreatePostRequest {
            text: content,
            reply: reply_to.map(|id| ReplySettings {
                in_reply_to_tweet_id: id,
            }),
        };
        let authorization = self.signer.authorization_header("POST", &self.endpoint, &[])?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Request to X failed: {}", e)))?;

        let status = response.status();
        debug!(status = %status, reply = reply_to.is_some(), "X responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body).into());
        }

        let created: CreatePostResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Posting(format!("Unexpected X response: {}", e)))?;

        Ok(created.data.id)
    }

    fn name(&self) -> &str {
        X_SERVICE
    }

    fn character_limit(&self) -> Option<usize> {
        Some(X_CHARACTER_LIMIT)
    }
}

/// Map a non-success HTTP status onto a platform error
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> PlatformError {
    let detail = format!("X returned {}: {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(detail),
        StatusCode::BAD_REQUEST => PlatformError::Validation(detail),
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimit(detail),
        _ => PlatformError::Posting(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_without_reply() {
        let body = CreatePostRequest {
            text: "hello",
            reply: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hello" }));
    }

    #[test]
    fn test_request_body_with_reply() {
        let body = CreatePostRequest {
            text: "second",
            reply: Some(ReplySettings {
                in_reply_to_tweet_id: "1850000000000000001",
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "second",
                "reply": { "in_reply_to_tweet_id": "1850000000000000001" }
            })
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"data":{"id":"1850000000000000001","text":"hello","edit_history_tweet_ids":["1850000000000000001"]}}"#;
        let parsed: CreatePostResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.id, "1850000000000000001");
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, ""),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, "duplicate content"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, ""),
            PlatformError::Validation(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            PlatformError::RateLimit(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, ""),
            PlatformError::Posting(_)
        ));
    }

    #[test]
    fn test_classify_failure_keeps_body() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "  Too Many Requests\n");
        assert!(err.to_string().contains("Too Many Requests"));
        assert!(err.to_string().contains("429"));
    }
}
