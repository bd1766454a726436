//! Content retrieval
//!
//! A source turns one [`SearchQuery`] into candidate news items. Each
//! `fetch` is one metered call against the service named by `name()`.

use async_trait::async_trait;

use crate::config::SearchQuery;
use crate::error::Result;
use crate::types::CandidateItem;

pub mod search;

// Mock source is available for all builds (not just tests) to support integration tests
pub mod mock;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Service identifier used for quota accounting
    fn name(&self) -> &str;

    /// Retrieve candidates for one query, tagged with the query's category
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<CandidateItem>>;
}
