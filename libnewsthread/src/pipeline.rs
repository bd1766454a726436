//! The news-thread job
//!
//! One [`NewsPipeline::run`] is one scheduled invocation: gate on quota,
//! retrieve candidates, drop what was seen before, compose, publish, and
//! record the calls that were actually made.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::composer::{clamp_segments, llm::LlmComposer, ThreadComposer};
use crate::config::{Config, SearchQuery};
use crate::db::Database;
use crate::dedup::Deduplicator;
use crate::error::{NewsthreadError, Result};
use crate::platforms::{x::XClient, Platform};
use crate::publisher::ThreadPublisher;
use crate::quota::QuotaTracker;
use crate::sources::{search::SearchClient, ContentSource};
use crate::types::{CandidateItem, ThreadStatus};

/// Summary of a run that published a thread (fully or partially)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub thread_id: String,
    pub topic: String,
    /// Candidates returned by all queries
    pub candidates: usize,
    /// Candidates left after deduplication
    pub admitted: usize,
    pub planned: u32,
    pub published: u32,
    #[serde(rename = "thread_status")]
    pub status: ThreadStatus,
    pub external_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// The four ways a run can end
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Published(PublishSummary),
    NoNewContent { candidates: usize },
    BudgetExceeded { service: String, used: u32, ceiling: u32 },
    Failed { error: String },
}

impl JobOutcome {
    /// HTTP-style status class of the outcome
    pub fn status_code(&self) -> u16 {
        match self {
            JobOutcome::Published(_) | JobOutcome::NoNewContent { .. } => 200,
            JobOutcome::BudgetExceeded { .. } => 429,
            JobOutcome::Failed { .. } => 500,
        }
    }

    /// Process exit code for the job binary
    pub fn exit_code(&self) -> i32 {
        match self {
            JobOutcome::Published(_) | JobOutcome::NoNewContent { .. } => 0,
            JobOutcome::BudgetExceeded { .. } => 3,
            JobOutcome::Failed { .. } => 1,
        }
    }

    /// JSON payload including the status code
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("status".to_string(), self.status_code().into());
        }
        serde_json::to_string(&value)
    }
}

pub struct NewsPipeline {
    quota: QuotaTracker,
    source: Arc<dyn ContentSource>,
    queries: Vec<SearchQuery>,
    dedup: Deduplicator,
    composer: Arc<dyn ThreadComposer>,
    segment_count: usize,
    publisher: ThreadPublisher,
    platform: Arc<dyn Platform>,
    topic: String,
}

impl NewsPipeline {
    /// Assemble a pipeline from explicit collaborators
    ///
    /// Queries, segment count, ceilings, pacing and topic come from `config`.
    pub fn new(
        config: &Config,
        db: Database,
        source: Arc<dyn ContentSource>,
        composer: Arc<dyn ThreadComposer>,
        platform: Arc<dyn Platform>,
    ) -> Result<Self> {
        let pacing = config.publishing.pacing_delay()?;
        let topic = config.publishing.topic_for(chrono::Utc::now().date_naive());

        let quota = QuotaTracker::new(db.clone(), config.quota.ceilings.clone());

        Ok(Self {
            source,
            queries: config.search.queries.clone(),
            dedup: Deduplicator::new(db.clone()),
            composer,
            segment_count: config.composer.segment_count,
            publisher: ThreadPublisher::new(platform.clone(), db, quota.clone(), pacing),
            quota,
            platform,
            topic,
        })
    }

    /// Open the database and build the production clients
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database.path).await?;
        let source = Arc::new(SearchClient::from_config(config)?);
        let composer = Arc::new(LlmComposer::from_config(config)?);
        let platform = Arc::new(XClient::from_config(config)?);
        Self::new(config, db, source, composer, platform)
    }

    /// Run the job once
    ///
    /// Never returns an error: every failure becomes [`JobOutcome::Failed`].
    pub async fn run(&self) -> JobOutcome {
        match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("News thread run failed: {}", e);
                JobOutcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn execute(&self) -> Result<JobOutcome> {
        for service in [self.platform.name(), self.source.name(), self.composer.name()] {
            if !self.quota.check_budget(service).await? {
                let used = self.quota.usage(service).await?;
                let ceiling = self.quota.ceiling(service).unwrap_or(used);
                warn!(service, used, ceiling, "Monthly budget exhausted, skipping run");
                return Ok(JobOutcome::BudgetExceeded {
                    service: service.to_string(),
                    used,
                    ceiling,
                });
            }
        }
        if let Some(remaining) = self.quota.remaining(self.platform.name()).await? {
            debug!(service = self.platform.name(), remaining, "Publish budget available");
        }

        let candidates = self.retrieve().await?;
        let candidate_count = candidates.len();

        let admitted = self.dedup.filter(candidates).await;
        if admitted.is_empty() {
            info!(candidates = candidate_count, "No new content to publish");
            return Ok(JobOutcome::NoNewContent {
                candidates: candidate_count,
            });
        }
        info!(candidates = candidate_count, admitted = admitted.len(), "Content deduplicated");

        let composed = self.composer.compose(&admitted, self.segment_count).await;
        self.quota.record_usage(self.composer.name(), 1).await?;
        let segments = clamp_segments(composed?, self.segment_count)?;

        // Items count as seen only once a thread has been composed from them
        let stored = self.dedup.remember(&admitted).await?;
        info!(stored, segments = segments.len(), "Thread composed");

        // Publish calls are metered by the publisher as they are sent
        let report = self.publisher.publish(&self.topic, &segments).await?;

        Ok(JobOutcome::Published(PublishSummary {
            thread_id: report.thread_id,
            topic: self.topic.clone(),
            candidates: candidate_count,
            admitted: admitted.len(),
            planned: report.planned,
            published: report.published,
            status: report.status,
            external_ids: report.external_ids,
            failure: report.failure,
        }))
    }

    /// Run every configured query in order
    ///
    /// A failing query is logged and skipped. If every query fails the
    /// run fails.
    async fn retrieve(&self) -> Result<Vec<CandidateItem>> {
        let mut candidates = Vec::new();
        let mut errors = Vec::new();
        let mut attempts = 0u32;

        for query in &self.queries {
            attempts += 1;
            match self.source.fetch(query).await {
                Ok(items) => {
                    info!(category = %query.category, count = items.len(), "Query returned items");
                    candidates.extend(items);
                }
                Err(e) => {
                    warn!(category = %query.category, "Query failed: {}", e);
                    errors.push(format!("{}: {}", query.category, e));
                }
            }
        }

        self.quota.record_usage(self.source.name(), attempts).await?;

        if !errors.is_empty() && errors.len() == self.queries.len() {
            return Err(NewsthreadError::Upstream(format!(
                "all queries failed ({})",
                errors.join("; ")
            )));
        }

        Ok(candidates)
    }
}
