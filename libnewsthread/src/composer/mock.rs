//! Mock composer returning fixed segments

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::composer::ThreadComposer;
use crate::error::{NewsthreadError, Result};
use crate::types::AdmittedItem;

pub struct MockComposer {
    name: String,
    segments: Option<Vec<String>>,
    calls: AtomicUsize,
}

impl MockComposer {
    /// A composer that always answers with `segments`
    pub fn with_segments(name: &str, segments: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            segments: Some(segments),
            calls: AtomicUsize::new(0),
        }
    }

    /// A composer that answers with `count` numbered segments
    pub fn numbered(name: &str, count: usize) -> Self {
        Self::with_segments(name, (1..=count).map(|i| format!("Post {} of the thread", i)).collect())
    }

    /// A composer that always fails
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            segments: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThreadComposer for MockComposer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn compose(&self, _items: &[AdmittedItem], _segment_count: usize) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.segments
            .clone()
            .ok_or_else(|| NewsthreadError::Composition("mock composer failed".to_string()))
    }
}
