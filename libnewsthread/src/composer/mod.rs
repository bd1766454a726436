//! Thread composition
//!
//! A composer turns admitted items into ordered post bodies. Callers clamp
//! the result to the requested count; composers may return fewer.

use async_trait::async_trait;

use crate::error::{NewsthreadError, Result};
use crate::types::AdmittedItem;

pub mod llm;

// Mock composer is available for all builds (not just tests) to support integration tests
pub mod mock;

#[async_trait]
pub trait ThreadComposer: Send + Sync {
    /// Service identifier used for quota accounting
    fn name(&self) -> &str;

    /// Produce up to `segment_count` post bodies from `items`
    async fn compose(&self, items: &[AdmittedItem], segment_count: usize) -> Result<Vec<String>>;
}

/// Normalize composer output into publishable segments
///
/// Trims each segment, drops blank ones, keeps the first `segment_count`.
/// An empty result is a composition error.
pub fn clamp_segments(segments: Vec<String>, segment_count: usize) -> Result<Vec<String>> {
    let segments: Vec<String> = segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(segment_count)
        .collect();

    if segments.is_empty() {
        return Err(NewsthreadError::Composition(
            "composer returned no segments".to_string(),
        ));
    }

    Ok(segments)
}
