use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{FilterCriteria, ListingRecord, ResolutionResult};
use crate::provider::{ListingFetch, ListingQuery};

/// Turns resolved locations into listing searches and flattens the results
pub struct ListingQueryBuilder {
    fetcher: Arc<dyn ListingFetch>,
    country: String,
}

impl ListingQueryBuilder {
    pub fn new(fetcher: Arc<dyn ListingFetch>, country: impl Into<String>) -> Self {
        Self {
            fetcher,
            country: country.into(),
        }
    }

    /// One provider query per resolved location, results kept in resolution order.
    ///
    /// A location without ids or a failed fetch contributes nothing; an empty
    /// result is not an error.
    pub async fn build_and_fetch(
        &self,
        resolution: &ResolutionResult,
        criteria: &FilterCriteria,
    ) -> Vec<ListingRecord> {
        let mut records = Vec::new();

        for (district, locations) in resolution.iter() {
            for location in locations {
                let Some((identifier_type, identifier_value)) = location.identifier() else {
                    warn!("No zoiId or locationId available for location: {}", location.name);
                    continue;
                };

                debug!(
                    "Fetching properties for district {} and location {} ({}: {})",
                    district.normalized_name, location.name, identifier_type, identifier_value
                );

                let query = ListingQuery {
                    country: self.country.clone(),
                    identifier_type,
                    identifier_value: identifier_value.to_string(),
                    criteria: criteria.clone(),
                };

                let elements = match self.fetcher.list_properties(&query).await {
                    Ok(elements) => elements,
                    Err(e) => {
                        warn!(
                            "{} fetch for location {} failed: {}",
                            self.fetcher.source_name(),
                            location.name,
                            e
                        );
                        continue;
                    }
                };

                info!("{} listings for {} in {}", elements.len(), location.name, district);
                let district_key = &district.normalized_name;
                records.extend(
                    elements
                        .iter()
                        .map(|element| ListingRecord::from_provider(element, district_key)),
                );
            }
        }

        records
    }
}
