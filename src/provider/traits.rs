use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::models::LocationCandidate;
use crate::provider::types::ListingQuery;

/// Autocomplete lookup used to turn district names into provider locations
#[async_trait]
pub trait LocationLookup: Send + Sync {
    /// Locations whose name starts with `prefix`. An empty list is a valid "no match".
    async fn autocomplete(
        &self,
        prefix: &str,
        country: &str,
    ) -> Result<Vec<LocationCandidate>, ProviderError>;
}

/// Listing search for a single provider location
#[async_trait]
pub trait ListingFetch: Send + Sync {
    /// Raw listing elements. An empty list is a valid "no results".
    async fn list_properties(&self, query: &ListingQuery) -> Result<Vec<Value>, ProviderError>;

    /// Get the name of the listing source
    fn source_name(&self) -> &'static str;
}
