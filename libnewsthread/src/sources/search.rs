//! Generative-search content source
//!
//! Asks a search-backed chat model for recent stories and reads them back
//! as a JSON array of `{title, description, url, published_at}` objects.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::chat::{strip_code_fence, ChatClient};
use crate::config::{Config, SearchQuery};
use crate::error::{NewsthreadError, Result};
use crate::sources::ContentSource;
use crate::types::CandidateItem;

const SYSTEM_PROMPT: &str = "You are a news researcher. Answer only with a JSON array. \
Each element is an object with the keys \"title\", \"description\", \"url\" and \
\"published_at\" (ISO 8601 date or null). Do not add commentary.";

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

pub struct SearchClient {
    service: String,
    chat: ChatClient,
    items_per_query: usize,
}

impl SearchClient {
    pub fn new(service: impl Into<String>, chat: ChatClient, items_per_query: usize) -> Self {
        Self {
            service: service.into(),
            chat,
            items_per_query,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let search = &config.search;
        let chat = ChatClient::new(&search.endpoint, &search.model, config.search_api_key()?)
            .map_err(|e| NewsthreadError::Upstream(e.to_string()))?;
        Ok(Self::new(&search.service, chat, search.items_per_query))
    }

    fn prompt(&self, query: &SearchQuery) -> String {
        format!(
            "List the {} most relevant stories for: {}. \
             Give each a short factual description.",
            self.items_per_query, query.topic
        )
    }
}

#[async_trait]
impl ContentSource for SearchClient {
    fn name(&self) -> &str {
        &self.service
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<CandidateItem>> {
        let answer = self
            .chat
            .complete(SYSTEM_PROMPT, &self.prompt(query))
            .await
            .map_err(|e| NewsthreadError::Upstream(format!("{} query failed: {}", query.category, e)))?;

        let mut items = parse_results(&answer, &query.category)?;
        items.truncate(self.items_per_query);
        debug!(category = %query.category, count = items.len(), "search returned items");
        Ok(items)
    }
}

/// Parse the model's answer into candidates for `category`
///
/// Entries with a blank title are skipped.
pub fn parse_results(answer: &str, category: &str) -> Result<Vec<CandidateItem>> {
    let results: Vec<SearchResult> = serde_json::from_str(strip_code_fence(answer)).map_err(|e| {
        NewsthreadError::Upstream(format!("{} answer is not a JSON array of stories: {}", category, e))
    })?;

    let items = results
        .into_iter()
        .filter_map(|result| {
            let title = result.title.trim();
            if title.is_empty() {
                warn!(category, "skipping search result without title");
                return None;
            }
            Some(CandidateItem {
                title: title.to_string(),
                description: result.description.trim().to_string(),
                source_url: result.url.filter(|u| !u.trim().is_empty()),
                published_at: result.published_at.as_deref().and_then(parse_timestamp),
                category: category.to_string(),
            })
        })
        .collect();

    Ok(items)
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates
fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}
