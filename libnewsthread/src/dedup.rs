//! Content-hash deduplication
//!
//! Items are identified by a SHA-256 fingerprint over their title and
//! description. Filtering only reads the store; admitted fingerprints are
//! written with [`Deduplicator::remember`] once the thread has been composed,
//! so a composer failure does not burn the item.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::Result;
use crate::types::{AdmittedItem, CandidateItem};

/// Fingerprint of an item: lowercase hex SHA-256 of `title ++ description`
///
/// No separator is inserted between the two fields; stored fingerprints
/// depend on this exact layout.
pub fn fingerprint(title: &str, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(description.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct Deduplicator {
    db: Database,
}

impl Deduplicator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Keep only candidates whose fingerprint is not yet stored
    ///
    /// Input order is preserved. A candidate repeating a fingerprint already
    /// admitted from this batch is dropped as well. If the store lookup fails
    /// for one candidate, that candidate is dropped and the rest continue.
    pub async fn filter(&self, candidates: Vec<CandidateItem>) -> Vec<AdmittedItem> {
        let total = candidates.len();
        let mut seen_in_batch = HashSet::new();
        let mut admitted = Vec::with_capacity(total);

        for item in candidates {
            let fingerprint = item.fingerprint();

            if seen_in_batch.contains(&fingerprint) {
                debug!("Dropping in-batch duplicate: {}", item.title);
                continue;
            }

            match self.db.fingerprint_exists(&fingerprint).await {
                Ok(true) => {
                    debug!("Dropping previously seen item: {}", item.title);
                }
                Ok(false) => {
                    seen_in_batch.insert(fingerprint.clone());
                    admitted.push(AdmittedItem { fingerprint, item });
                }
                Err(e) => {
                    warn!("Fingerprint lookup failed for '{}', skipping item: {}", item.title, e);
                }
            }
        }

        debug!("Deduplication admitted {} of {} candidates", admitted.len(), total);
        admitted
    }

    /// Persist admitted items so later runs treat them as seen
    ///
    /// Returns the number of newly stored fingerprints.
    pub async fn remember(&self, admitted: &[AdmittedItem]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut stored = 0;

        for item in admitted {
            if self.db.insert_item_if_absent(item, now).await? {
                stored += 1;
            }
        }

        Ok(stored)
    }
}
