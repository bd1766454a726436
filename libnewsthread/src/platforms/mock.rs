//! Mock platform for exercising the publisher without network access
//!
//! Every call is recorded. A failure can be scheduled for a given call
//! number to simulate a platform error partway through a thread.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{PlatformError, Result};
use crate::platforms::{validate_length, Platform};

/// One recorded `post` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    pub content: String,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,
    pub character_limit: Option<usize>,
    /// 1-based call number that fails, if any
    pub fail_at: Option<usize>,
    pub failure: PlatformError,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            character_limit: Some(280),
            fail_at: None,
            failure: PlatformError::Posting("Mock posting failed".to_string()),
        }
    }
}

pub struct MockPlatform {
    config: MockConfig,
    calls: Arc<Mutex<Vec<RecordedPost>>>,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A platform named `name` that accepts every post
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A platform whose `call`-th post (1-based) fails with `error`
    pub fn failing_at(name: &str, call: usize, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            fail_at: Some(call),
            failure: error,
            ..Default::default()
        })
    }

    /// Every call made so far, including failed ones
    pub fn calls(&self) -> Vec<RecordedPost> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// Id returned for the `call`-th post
    pub fn post_id(call: usize) -> String {
        format!("mock-{}", call)
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<RecordedPost>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn post(&self, content: &str, reply_to: Option<&str>) -> Result<String> {
        let call = {
            let mut calls = self.lock_calls();
            calls.push(RecordedPost {
                content: content.to_string(),
                reply_to: reply_to.map(str::to_string),
            });
            calls.len()
        };

        self.validate_content(content)?;

        if self.config.fail_at == Some(call) {
            return Err(self.config.failure.clone().into());
        }

        Ok(Self::post_id(call))
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        validate_length(content, self.config.character_limit)
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }
}
