use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::SearchError;
use crate::models::{FilterCriteria, ListingRecord, SnapshotHandle};
use crate::provider::{ListingFetch, LocationLookup};
use crate::query::ListingQueryBuilder;
use crate::resolver::{DisambiguationMode, LocationResolver};
use crate::snapshot::SnapshotStore;

const NOT_AVAILABLE: &str = "N/A";

/// A search as submitted by a user
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub city: String,
    /// One district per line
    pub districts: String,
    pub criteria: FilterCriteria,
}

/// Result of a successful search
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<ListingRecord>,
    pub snapshot: SnapshotHandle,
    /// Ids of the first resolved location, for display
    pub zoi_id: String,
    pub location_id: String,
}

/// Resolve, fetch and persist in one go
pub struct RentalSearch {
    resolver: LocationResolver,
    query_builder: ListingQueryBuilder,
    store: Arc<dyn SnapshotStore>,
}

impl RentalSearch {
    pub fn new(
        lookup: Arc<dyn LocationLookup>,
        fetcher: Arc<dyn ListingFetch>,
        store: Arc<dyn SnapshotStore>,
        country: &str,
        mode: DisambiguationMode,
    ) -> Self {
        Self {
            resolver: LocationResolver::new(lookup, country, mode),
            query_builder: ListingQueryBuilder::new(fetcher, country),
            store,
        }
    }

    pub async fn run(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let districts = split_districts(&request.districts);
        info!("Searching {} districts in {}", districts.len(), request.city.trim());

        let resolution = self.resolver.resolve(&request.city, &districts).await?;
        let results = self
            .query_builder
            .build_and_fetch(&resolution, &request.criteria)
            .await;

        if results.is_empty() {
            return Err(SearchError::NoPropertiesFound);
        }

        let snapshot = self.store.save(&results).await?;

        let first = resolution.first_location();
        let zoi_id = first
            .and_then(|l| l.zoi_id.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let location_id = first
            .and_then(|l| l.location_id.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        info!("✅ Found {} properties", results.len());
        Ok(SearchOutcome {
            results,
            snapshot,
            zoi_id,
            location_id,
        })
    }
}

/// Split multi-line district input, dropping blank lines
pub fn split_districts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
