//! Database operations for Newsthread

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{AdmittedItem, Thread, ThreadPost, ThreadStatus, UsageCounter};

/// A thread together with its published posts in position order
#[derive(Debug, Clone, serde::Serialize)]
pub struct ThreadWithPosts {
    pub thread: Thread,
    pub posts: Vec<ThreadPost>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the file on first open
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Access the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Usage counters
    // ------------------------------------------------------------------

    /// Get the usage counter for a service in a given month
    pub async fn get_usage(&self, service: &str, month_key: &str) -> Result<Option<UsageCounter>> {
        let row = sqlx::query(
            r#"
            SELECT service, month_key, request_count, last_reset
            FROM api_usage WHERE service = ? AND month_key = ?
            "#,
        )
        .bind(service)
        .bind(month_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| usage_from_row(&r)))
    }

    /// Add `delta` to a service's counter for the month, creating the row if needed
    ///
    /// Single-statement upsert, so the read-increment-write cannot lose an
    /// update between statements.
    pub async fn increment_usage(&self, service: &str, month_key: &str, delta: u32, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_usage (service, month_key, request_count, last_reset, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(service, month_key)
            DO UPDATE SET request_count = request_count + excluded.request_count,
                          updated_at = excluded.updated_at
            "#,
        )
        .bind(service)
        .bind(month_key)
        .bind(i64::from(delta))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// List usage counters, optionally restricted to one month
    pub async fn list_usage(&self, month_key: Option<&str>) -> Result<Vec<UsageCounter>> {
        let rows = match month_key {
            Some(month) => {
                sqlx::query(
                    r#"
                    SELECT service, month_key, request_count, last_reset
                    FROM api_usage WHERE month_key = ?
                    ORDER BY service
                    "#,
                )
                .bind(month)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT service, month_key, request_count, last_reset
                    FROM api_usage
                    ORDER BY month_key DESC, service
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(usage_from_row).collect())
    }

    // ------------------------------------------------------------------
    // Fingerprinted items
    // ------------------------------------------------------------------

    /// Check whether a fingerprint is already stored
    pub async fn fingerprint_exists(&self, fingerprint: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM news_items WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.is_some())
    }

    /// Store an admitted item unless its fingerprint is already present
    ///
    /// Returns `true` if a row was inserted.
    pub async fn insert_item_if_absent(&self, admitted: &AdmittedItem, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO news_items (fingerprint, title, description, source_url, published_at, category, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fingerprint) DO NOTHING
            "#,
        )
        .bind(&admitted.fingerprint)
        .bind(&admitted.item.title)
        .bind(&admitted.item.description)
        .bind(&admitted.item.source_url)
        .bind(admitted.item.published_at)
        .bind(&admitted.item.category)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    /// Create a new thread row
    pub async fn create_thread(&self, thread: &Thread) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO threads (id, topic, planned_count, published_count, status, first_post_id, created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&thread.id)
        .bind(&thread.topic)
        .bind(i64::from(thread.planned_count))
        .bind(i64::from(thread.published_count))
        .bind(thread.status.as_str())
        .bind(&thread.first_post_id)
        .bind(thread.created_at)
        .bind(thread.completed_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Record a successfully sent post and bump its thread's published count
    ///
    /// Both writes happen in one transaction so the thread's count always
    /// equals the number of post rows. Position 1 also sets the thread's
    /// first-post reference.
    pub async fn record_thread_post(&self, post: &ThreadPost) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO thread_posts (thread_id, position, body, external_id, reply_to_id, posted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.thread_id)
        .bind(i64::from(post.position))
        .bind(&post.body)
        .bind(&post.external_id)
        .bind(&post.reply_to_id)
        .bind(post.posted_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        let updated = sqlx::query(
            r#"
            UPDATE threads
            SET published_count = published_count + 1,
                first_post_id = CASE WHEN ? = 1 THEN ? ELSE first_post_id END
            WHERE id = ?
            "#,
        )
        .bind(i64::from(post.position))
        .bind(&post.external_id)
        .bind(&post.thread_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        if updated.rows_affected() != 1 {
            // Dropping the transaction rolls back the post insert
            return Err(DbError::SqlxError(sqlx::Error::RowNotFound).into());
        }

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(inserted.last_insert_rowid())
    }

    /// Persist the final published count and status of a thread
    pub async fn finalize_thread(
        &self,
        thread_id: &str,
        published_count: u32,
        status: ThreadStatus,
        completed_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE threads SET published_count = ?, status = ?, completed_at = ? WHERE id = ?
            "#,
        )
        .bind(i64::from(published_count))
        .bind(status.as_str())
        .bind(completed_at)
        .bind(thread_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a thread by ID
    pub async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let row = sqlx::query(
            r#"
            SELECT id, topic, planned_count, published_count, status, first_post_id, created_at, completed_at
            FROM threads WHERE id = ?
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| thread_from_row(&r)))
    }

    /// Get the posts of a thread ordered by position
    pub async fn get_thread_posts(&self, thread_id: &str) -> Result<Vec<ThreadPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, thread_id, position, body, external_id, reply_to_id, posted_at
            FROM thread_posts
            WHERE thread_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| ThreadPost {
                id: r.get("id"),
                thread_id: r.get("thread_id"),
                position: r.get::<i64, _>("position") as u32,
                body: r.get("body"),
                external_id: r.get("external_id"),
                reply_to_id: r.get("reply_to_id"),
                posted_at: r.get("posted_at"),
            })
            .collect())
    }

    /// List recent threads with their posts, newest first
    pub async fn list_threads(&self, status: Option<ThreadStatus>, limit: usize) -> Result<Vec<ThreadWithPosts>> {
        let mut sql = String::from(
            r#"
            SELECT id, topic, planned_count, published_count, status, first_post_id, created_at, completed_at
            FROM threads
            "#,
        );
        if status.is_some() {
            sql.push_str(" WHERE status = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        query = query.bind(limit as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(DbError::SqlxError)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let thread = thread_from_row(&row);
            let posts = self.get_thread_posts(&thread.id).await?;
            results.push(ThreadWithPosts { thread, posts });
        }

        Ok(results)
    }
}

fn usage_from_row(r: &sqlx::sqlite::SqliteRow) -> UsageCounter {
    UsageCounter {
        service: r.get("service"),
        month_key: r.get("month_key"),
        request_count: r.get::<i64, _>("request_count") as u32,
        last_reset: r.get("last_reset"),
    }
}

fn thread_from_row(r: &sqlx::sqlite::SqliteRow) -> Thread {
    Thread {
        id: r.get("id"),
        topic: r.get("topic"),
        planned_count: r.get::<i64, _>("planned_count") as u32,
        published_count: r.get::<i64, _>("published_count") as u32,
        status: r
            .get::<String, _>("status")
            .parse()
            .unwrap_or(ThreadStatus::Partial),
        first_post_id: r.get("first_post_id"),
        created_at: r.get("created_at"),
        completed_at: r.get("completed_at"),
    }
}
