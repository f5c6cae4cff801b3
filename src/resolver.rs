//! District name resolution against the provider's autocomplete endpoint.
//!
//! A district typed by the user is looked up by prefix, filtered down to the
//! candidates whose normalized name contains both the district and the city,
//! then split into metro zones and administrative districts. How the two groups
//! are combined depends on [`DisambiguationMode`].

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::models::{DistrictQuery, LocationCandidate, ResolutionResult};
use crate::normalize::normalize;
use crate::provider::LocationLookup;

pub const METRO_LABEL: &str = "metro:";
pub const DISTRICT_LABEL: &str = "district:";

/// Port used to ask the requester which locations to keep
#[async_trait]
pub trait LocationChooser: Send + Sync {
    /// Present labeled options and return the labels picked, in pick order
    async fn choose(&self, district: &DistrictQuery, options: &[String]) -> Vec<String>;

    /// Called when a district resolved to a single group and was taken without asking
    async fn announce_automatic(
        &self,
        _district: &DistrictQuery,
        _selected: &[LocationCandidate],
    ) {
    }
}

/// How to combine metro zones and regular districts when both match
#[derive(Clone)]
pub enum DisambiguationMode {
    /// Take metro zones followed by regular districts without asking
    Automatic,
    /// Ask the chooser whenever both groups are present
    Interactive(Arc<dyn LocationChooser>),
}

pub struct LocationResolver {
    lookup: Arc<dyn LocationLookup>,
    country: String,
    mode: DisambiguationMode,
}

impl LocationResolver {
    pub fn new(
        lookup: Arc<dyn LocationLookup>,
        country: impl Into<String>,
        mode: DisambiguationMode,
    ) -> Self {
        Self {
            lookup,
            country: country.into(),
            mode,
        }
    }

    /// Resolve every district of `city` to provider locations
    pub async fn resolve(
        &self,
        city: &str,
        districts: &[String],
    ) -> Result<ResolutionResult, SearchError> {
        let mut seen = HashSet::new();
        let queries: Vec<DistrictQuery> = districts
            .iter()
            .filter(|d| !d.trim().is_empty())
            .map(|d| DistrictQuery::new(d))
            .filter(|q| seen.insert(q.normalized_name.clone()))
            .collect();

        if queries.is_empty() {
            return Err(SearchError::NoDistrictsProvided);
        }
        if city.trim().is_empty() {
            return Err(SearchError::BlankCity);
        }

        let city_key = normalize(city.trim());
        let mut entries = Vec::new();
        let mut unmatched = Vec::new();

        for query in queries {
            match self.resolve_district(&query, &city_key).await {
                Some(locations) => {
                    let names: Vec<&str> = locations.iter().map(|l| l.name.as_str()).collect();
                    info!("Selected locations for {}: {}", query, names.join(", "));
                    entries.push((query, locations));
                }
                None => {
                    info!("No matches found for district {}", query);
                    unmatched.push(query);
                }
            }
        }

        if entries.is_empty() {
            return Err(SearchError::NoMatchesFound);
        }

        Ok(ResolutionResult::new(entries, unmatched))
    }

    async fn resolve_district(
        &self,
        query: &DistrictQuery,
        city_key: &str,
    ) -> Option<Vec<LocationCandidate>> {
        let candidates = match self.lookup.autocomplete(&query.raw_name, &self.country).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Location lookup for {} failed: {}", query, e);
                return None;
            }
        };
        debug!("{} autocomplete candidates for {}", candidates.len(), query);

        let (metro_zones, regular): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .filter(|c| {
                let name = normalize(&c.name);
                name.contains(&query.normalized_name) && name.contains(city_key)
            })
            .partition(LocationCandidate::is_metro_zone);

        if metro_zones.is_empty() && regular.is_empty() {
            return None;
        }

        let selected = match &self.mode {
            DisambiguationMode::Interactive(chooser)
                if !metro_zones.is_empty() && !regular.is_empty() =>
            {
                choose_between(chooser.as_ref(), query, metro_zones, regular).await
            }
            DisambiguationMode::Interactive(chooser) => {
                let selected: Vec<_> = metro_zones.into_iter().chain(regular).collect();
                chooser.announce_automatic(query, &selected).await;
                selected
            }
            DisambiguationMode::Automatic => metro_zones.into_iter().chain(regular).collect(),
        };

        if selected.is_empty() {
            None
        } else {
            Some(selected)
        }
    }
}

/// Each picked label consumes the front of its group's queue, in pick order
async fn choose_between(
    chooser: &dyn LocationChooser,
    query: &DistrictQuery,
    metro_zones: Vec<LocationCandidate>,
    regular: Vec<LocationCandidate>,
) -> Vec<LocationCandidate> {
    let options: Vec<String> = metro_zones
        .iter()
        .map(|l| format!("{} {}", METRO_LABEL, l.name))
        .chain(regular.iter().map(|l| format!("{} {}", DISTRICT_LABEL, l.name)))
        .collect();

    let picked = chooser.choose(query, &options).await;

    let mut metro_queue = VecDeque::from(metro_zones);
    let mut district_queue = VecDeque::from(regular);
    let mut selected = Vec::new();
    for label in picked {
        let next = if label.starts_with(METRO_LABEL) {
            metro_queue.pop_front()
        } else if label.starts_with(DISTRICT_LABEL) {
            district_queue.pop_front()
        } else {
            debug!("Ignoring unknown choice {:?}", label);
            None
        };
        selected.extend(next);
    }
    selected
}
