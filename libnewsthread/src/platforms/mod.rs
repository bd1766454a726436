//! Publishing platform abstraction
//!
//! A platform accepts one post at a time, optionally as a reply to an
//! earlier post, and returns the platform's id for the created post.

use async_trait::async_trait;

use crate::error::{PlatformError, Result};

pub mod x;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Publish `content`, replying to `reply_to` when given
    ///
    /// Returns the platform-specific id of the new post. The id is what a
    /// following post in the same thread must reply to.
    ///
    /// # Errors
    ///
    /// - `PlatformError::Validation` if the content is rejected before sending
    /// - `PlatformError::Authentication` for rejected credentials
    /// - `PlatformError::RateLimit` when the platform throttles the request
    /// - `PlatformError::Network` / `PlatformError::Posting` for other failures
    async fn post(&self, content: &str, reply_to: Option<&str>) -> Result<String>;

    /// Check content against platform rules without sending it
    fn validate_content(&self, content: &str) -> Result<()> {
        validate_length(content, self.character_limit())
    }

    /// Lowercase platform identifier, also used as the quota service name
    fn name(&self) -> &str;

    /// Maximum characters per post, or `None` when unlimited
    fn character_limit(&self) -> Option<usize>;
}

/// Reject empty content and content over `limit` characters
///
/// Length is counted in Unicode scalar values, not bytes.
pub fn validate_length(content: &str, limit: Option<usize>) -> Result<()> {
    if content.trim().is_empty() {
        return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
    }

    if let Some(limit) = limit {
        let length = content.chars().count();
        if length > limit {
            return Err(PlatformError::Validation(format!(
                "Content exceeds {} character limit (got {} characters)",
                limit, length
            ))
            .into());
        }
    }

    Ok(())
}
