//! Core types for Newsthread

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A news item returned by a content source, before deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub title: String,
    pub description: String,
    pub source_url: Option<String>,
    /// Publication time as a Unix timestamp, when the source reported one
    pub published_at: Option<i64>,
    /// Category tag of the query that produced the item (e.g. "international")
    pub category: String,
}

impl CandidateItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            source_url: None,
            published_at: None,
            category: category.into(),
        }
    }

    /// Content fingerprint of this item, see [`crate::dedup::fingerprint`]
    pub fn fingerprint(&self) -> String {
        crate::dedup::fingerprint(&self.title, &self.description)
    }
}

/// A candidate that survived deduplication, with its fingerprint attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedItem {
    pub fingerprint: String,
    pub item: CandidateItem,
}

/// Monthly request counter for one external service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub service: String,
    /// Calendar month in `YYYY-MM` form
    pub month_key: String,
    pub request_count: u32,
    /// When the counter for this month was first created (Unix timestamp)
    pub last_reset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Partial,
    Completed,
    /// Present in the schema; the publish loop never assigns it.
    Failed,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Partial => "partial",
            ThreadStatus::Completed => "completed",
            ThreadStatus::Failed => "failed",
        }
    }

    /// Status a thread resolves to once its publish loop has ended
    pub fn resolve(published: u32, planned: u32) -> Self {
        if published == planned {
            ThreadStatus::Completed
        } else {
            ThreadStatus::Partial
        }
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ThreadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "partial" => Ok(ThreadStatus::Partial),
            "completed" => Ok(ThreadStatus::Completed),
            "failed" => Ok(ThreadStatus::Failed),
            _ => Err(format!(
                "Invalid thread status: '{}'. Valid options: partial, completed, failed",
                s
            )),
        }
    }
}

/// One publication unit: an ordered group of posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub topic: String,
    pub planned_count: u32,
    pub published_count: u32,
    pub status: ThreadStatus,
    /// Platform-assigned id of the post at position 1
    pub first_post_id: Option<String>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl Thread {
    pub fn new(topic: String, planned_count: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic,
            planned_count,
            published_count: 0,
            status: ThreadStatus::Partial,
            first_post_id: None,
            created_at: chrono::Utc::now().timestamp(),
            completed_at: None,
        }
    }
}

/// A successfully published post belonging to a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadPost {
    pub id: Option<i64>,
    pub thread_id: String,
    /// 1-based position inside the thread
    pub position: u32,
    pub body: String,
    pub external_id: Option<String>,
    /// External id of the post this one replies to (None for position 1)
    pub reply_to_id: Option<String>,
    pub posted_at: i64,
}
