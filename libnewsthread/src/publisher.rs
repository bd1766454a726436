//! Sequential thread publishing
//!
//! Posts segments one at a time, each replying to the previous one, and
//! persists every successful post before sending the next. The first send
//! failure ends the thread; what was published so far stays as a `partial`
//! thread. Every request sent is metered against the platform's monthly
//! budget as soon as it returns.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::platforms::Platform;
use crate::quota::QuotaTracker;
use crate::types::{Thread, ThreadPost, ThreadStatus};

/// Outcome of publishing one thread
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub thread_id: String,
    pub planned: u32,
    pub published: u32,
    pub status: ThreadStatus,
    /// External ids of the published posts, in position order
    pub external_ids: Vec<String>,
    /// Error that stopped the loop, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Requests actually sent to the platform
    #[serde(skip)]
    pub attempts: u32,
}

/// Wait between two consecutive posts of a thread
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Sleeps for a fixed delay; a zero delay returns immediately
pub struct SleepPacer {
    delay: Duration,
}

impl SleepPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Pacer for SleepPacer {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

pub struct ThreadPublisher {
    platform: Arc<dyn Platform>,
    db: Database,
    quota: QuotaTracker,
    pacer: Arc<dyn Pacer>,
}

impl ThreadPublisher {
    /// Create a publisher that sleeps `pacing` between posts
    pub fn new(platform: Arc<dyn Platform>, db: Database, quota: QuotaTracker, pacing: Duration) -> Self {
        Self::with_pacer(platform, db, quota, Arc::new(SleepPacer::new(pacing)))
    }

    /// Create a publisher with an explicit pacer
    pub fn with_pacer(
        platform: Arc<dyn Platform>,
        db: Database,
        quota: QuotaTracker,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            platform,
            db,
            quota,
            pacer,
        }
    }

    /// Publish `segments` as one thread under `topic`
    ///
    /// Send failures stop the loop and are reported in the returned
    /// [`PublishReport`]. Store failures are returned as errors; requests
    /// already sent by then have been metered.
    pub async fn publish(&self, topic: &str, segments: &[String]) -> Result<PublishReport> {
        let planned = segments.len() as u32;
        let thread = Thread::new(topic.to_string(), planned);
        self.db.create_thread(&thread).await?;

        info!(
            thread_id = %thread.id,
            planned,
            platform = self.platform.name(),
            "Publishing thread"
        );

        let mut external_ids: Vec<String> = Vec::with_capacity(segments.len());
        let mut failure = None;
        let mut attempts = 0u32;

        for (index, body) in segments.iter().enumerate() {
            let position = index as u32 + 1;
            let reply_to = external_ids.last().cloned();

            if let Err(e) = self.platform.validate_content(body) {
                warn!(position, "Segment rejected before sending: {}", e);
                failure = Some(format!("segment {}: {}", position, e));
                break;
            }

            attempts += 1;
            let sent = self.platform.post(body, reply_to.as_deref()).await;
            self.quota.record_usage(self.platform.name(), 1).await?;

            let external_id = match sent {
                Ok(id) => id,
                Err(e) => {
                    warn!(position, "Publishing stopped: {}", e);
                    failure = Some(format!("segment {}: {}", position, e));
                    break;
                }
            };

            let post = ThreadPost {
                id: None,
                thread_id: thread.id.clone(),
                position,
                body: body.clone(),
                external_id: Some(external_id.clone()),
                reply_to_id: reply_to,
                posted_at: chrono::Utc::now().timestamp(),
            };
            self.db.record_thread_post(&post).await?;
            debug!(position, external_id = %external_id, "Segment published");
            external_ids.push(external_id);

            if index + 1 < segments.len() {
                self.pacer.pause().await;
            }
        }

        let published = external_ids.len() as u32;
        let status = ThreadStatus::resolve(published, planned);
        self.db
            .finalize_thread(&thread.id, published, status, chrono::Utc::now().timestamp())
            .await?;

        info!(thread_id = %thread.id, published, planned, status = %status, "Thread finalized");

        Ok(PublishReport {
            thread_id: thread.id,
            planned,
            published,
            status,
            external_ids,
            failure,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::platforms::mock::MockPlatform;
    use crate::quota::month_key;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    async fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path.to_string_lossy()).await.unwrap();
        (temp_dir, db)
    }

    fn publisher(platform: Arc<dyn Platform>, db: &Database, pacing: Duration) -> ThreadPublisher {
        let quota = QuotaTracker::new(db.clone(), HashMap::new());
        ThreadPublisher::new(platform, db.clone(), quota, pacing)
    }

    #[derive(Default)]
    struct CountingPacer {
        pauses: AtomicUsize,
    }

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn paced_publisher(platform: Arc<dyn Platform>, db: &Database) -> (ThreadPublisher, Arc<CountingPacer>) {
        let pacer = Arc::new(CountingPacer::default());
        let quota = QuotaTracker::new(db.clone(), HashMap::new());
        let publisher = ThreadPublisher::with_pacer(platform, db.clone(), quota, pacer.clone());
        (publisher, pacer)
    }

    async fn metered(db: &Database, service: &str) -> u32 {
        db.get_usage(service, &month_key(chrono::Utc::now()))
            .await
            .unwrap()
            .map(|c| c.request_count)
            .unwrap_or(0)
    }

    fn segments(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}/ story number {}", i, i)).collect()
    }

    #[tokio::test]
    async fn test_all_segments_published() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::success("mock"));
        let publisher = publisher(platform.clone(), &db, Duration::ZERO);

        let report = publisher.publish("Digest", &segments(8)).await.unwrap();

        assert_eq!(report.planned, 8);
        assert_eq!(report.published, 8);
        assert_eq!(report.status, ThreadStatus::Completed);
        assert_eq!(report.attempts, 8);
        assert!(report.failure.is_none());

        let thread = db.get_thread(&report.thread_id).await.unwrap().unwrap();
        assert_eq!(thread.status, ThreadStatus::Completed);
        assert_eq!(thread.published_count, 8);
        assert_eq!(thread.first_post_id.as_deref(), Some("mock-1"));
        assert!(thread.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_replies_chain_to_previous_post() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::success("mock"));
        let publisher = publisher(platform.clone(), &db, Duration::ZERO);

        publisher.publish("Digest", &segments(3)).await.unwrap();

        let calls = platform.calls();
        assert_eq!(calls[0].reply_to, None);
        assert_eq!(calls[1].reply_to.as_deref(), Some("mock-1"));
        assert_eq!(calls[2].reply_to.as_deref(), Some("mock-2"));
    }

    #[tokio::test]
    async fn test_failure_at_segment_four_keeps_prefix() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::failing_at(
            "mock",
            4,
            PlatformError::Posting("503 Service Unavailable".to_string()),
        ));
        let publisher = publisher(platform.clone(), &db, Duration::ZERO);

        let report = publisher.publish("Digest", &segments(10)).await.unwrap();

        assert_eq!(report.planned, 10);
        assert_eq!(report.published, 3);
        assert_eq!(report.status, ThreadStatus::Partial);
        assert_eq!(report.attempts, 4);
        assert!(report.failure.as_deref().unwrap().contains("segment 4"));
        // No retry and no skipping past the failed segment
        assert_eq!(platform.call_count(), 4);

        let posts = db.get_thread_posts(&report.thread_id).await.unwrap();
        let positions: Vec<u32> = posts.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(posts[2].reply_to_id.as_deref(), Some("mock-2"));

        let thread = db.get_thread(&report.thread_id).await.unwrap().unwrap();
        assert_eq!(thread.published_count, 3);
        assert_eq!(thread.status, ThreadStatus::Partial);
    }

    #[tokio::test]
    async fn test_failure_on_first_segment() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::failing_at(
            "mock",
            1,
            PlatformError::Authentication("401".to_string()),
        ));
        let publisher = publisher(platform, &db, Duration::ZERO);

        let report = publisher.publish("Digest", &segments(5)).await.unwrap();
        assert_eq!(report.published, 0);
        assert_eq!(report.status, ThreadStatus::Partial);

        let thread = db.get_thread(&report.thread_id).await.unwrap().unwrap();
        assert_eq!(thread.first_post_id, None);
        assert!(db.get_thread_posts(&report.thread_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_segment_stops_without_sending() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::success("mock"));
        let publisher = publisher(platform.clone(), &db, Duration::ZERO);

        let mut bodies = segments(4);
        bodies[1] = "x".repeat(281);

        let report = publisher.publish("Digest", &bodies).await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(report.attempts, 1);
        assert_eq!(platform.call_count(), 1);
        assert_eq!(report.status, ThreadStatus::Partial);
    }

    #[tokio::test]
    async fn test_pauses_between_posts_only() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::success("mock"));
        let (publisher, pacer) = paced_publisher(platform, &db);

        let report = publisher.publish("Digest", &segments(3)).await.unwrap();

        assert_eq!(report.status, ThreadStatus::Completed);
        assert_eq!(pacer.pauses.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_segment_never_pauses() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::success("mock"));
        let (publisher, pacer) = paced_publisher(platform, &db);

        let report = publisher.publish("Digest", &segments(1)).await.unwrap();

        assert_eq!(report.published, 1);
        assert_eq!(pacer.pauses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_pause_after_failed_segment() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::failing_at(
            "mock",
            2,
            PlatformError::Posting("503".to_string()),
        ));
        let (publisher, pacer) = paced_publisher(platform, &db);

        let report = publisher.publish("Digest", &segments(5)).await.unwrap();

        assert_eq!(report.published, 1);
        assert_eq!(pacer.pauses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sleep_pacer_waits_for_delay() {
        let pacer = SleepPacer::new(Duration::from_millis(20));

        let started = std::time::Instant::now();
        pacer.pause().await;
        assert!(started.elapsed() >= Duration::from_millis(20));

        let started = std::time::Instant::now();
        SleepPacer::new(Duration::ZERO).pause().await;
        assert!(started.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_every_sent_request_is_metered() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::failing_at(
            "x",
            4,
            PlatformError::Posting("503".to_string()),
        ));
        let publisher = publisher(platform, &db, Duration::ZERO);

        let report = publisher.publish("Digest", &segments(6)).await.unwrap();
        assert_eq!(report.attempts, 4);

        // Three successes plus the failing send
        assert_eq!(metered(&db, "x").await, 4);
    }

    #[tokio::test]
    async fn test_locally_rejected_segment_is_not_metered() {
        let (_temp, db) = setup_test_db().await;
        let platform = Arc::new(MockPlatform::success("x"));
        let publisher = publisher(platform, &db, Duration::ZERO);

        let mut bodies = segments(3);
        bodies[2] = "x".repeat(281);
        publisher.publish("Digest", &bodies).await.unwrap();

        assert_eq!(metered(&db, "x").await, 2);
    }
}
