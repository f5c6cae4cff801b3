use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SnapshotError;
use crate::models::{ListingRecord, Snapshot};
use crate::snapshot::SnapshotStore;

/// Finds listings that were not in the snapshot seen on the previous cycle.
///
/// Owns its retained state; the only writer is [`ChangeDetector::detect_new_listings`].
pub struct ChangeDetector {
    store: Arc<dyn SnapshotStore>,
    current: Option<Arc<Snapshot>>,
    previous: Option<Arc<Snapshot>>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            current: None,
            previous: None,
        }
    }

    /// Listings in the latest snapshot whose url the retained snapshot did not have.
    ///
    /// The first cycle has nothing to compare against and reports nothing.
    pub async fn detect_new_listings(&mut self) -> Result<Vec<ListingRecord>, SnapshotError> {
        let Some(latest) = self.store.load_latest().await? else {
            debug!("No snapshot stored yet");
            return Ok(Vec::new());
        };
        let latest = Arc::new(latest);

        let new_listings = match &self.current {
            Some(current) => {
                let prior_urls: HashSet<&str> =
                    current.records.iter().map(|r| r.url.as_str()).collect();
                latest
                    .records
                    .iter()
                    .filter(|r| !prior_urls.contains(r.url.as_str()))
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        info!(
            "Checked snapshot from {}: {} listings, {} new",
            latest.created_at,
            latest.records.len(),
            new_listings.len()
        );

        self.previous = self.current.replace(latest);
        Ok(new_listings)
    }

    /// Snapshot retained by the last cycle
    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    /// Snapshot retained by the cycle before that
    pub fn previous(&self) -> Option<&Arc<Snapshot>> {
        self.previous.as_ref()
    }
}
