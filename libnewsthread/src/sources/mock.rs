//! Mock content source with canned results per category

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::SearchQuery;
use crate::error::{NewsthreadError, Result};
use crate::sources::ContentSource;
use crate::types::CandidateItem;

pub struct MockSource {
    name: String,
    items: HashMap<String, Vec<CandidateItem>>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: HashMap::new(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Return `items` for queries of `category`
    pub fn with_items(mut self, category: &str, items: Vec<CandidateItem>) -> Self {
        self.items.insert(category.to_string(), items);
        self
    }

    /// Fail every query of `category`
    pub fn failing(mut self, category: &str) -> Self {
        self.failing.push(category.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<CandidateItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(&query.category) {
            return Err(NewsthreadError::Upstream(format!(
                "mock {} query failed",
                query.category
            )));
        }

        Ok(self.items.get(&query.category).cloned().unwrap_or_default())
    }
}
