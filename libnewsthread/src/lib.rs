//! Newsthread - scheduled news-thread publishing
//!
//! This library provides the pipeline behind the `newsthread-run` job:
//! discover news items through a generative-search API, drop anything already
//! seen, compose a thread, and publish it post by post to a rate-limited
//! platform with signed requests, persisting progress as it goes.

pub mod chat;
pub mod composer;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod platforms;
pub mod publisher;
pub mod quota;
pub mod signer;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{NewsthreadError, Result};
pub use pipeline::{JobOutcome, NewsPipeline};
pub use types::{AdmittedItem, CandidateItem, Thread, ThreadPost, ThreadStatus, UsageCounter};
