use serde::Deserialize;
use serde_json::Value;

use crate::models::{FilterCriteria, LocationCandidate};

/// Listings per request; the provider caps a page at 40
pub const MAX_ITEMS: u32 = 40;

/// One listing search against a single provider location
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    /// Country code the search is scoped to
    pub country: String,
    /// Either `zoiId` or `locationId`
    pub identifier_type: &'static str,
    pub identifier_value: String,
    pub criteria: FilterCriteria,
}

impl ListingQuery {
    /// Query string pairs in the order the provider documents them.
    ///
    /// Unset criteria are left out entirely, never sent blank.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("numPage", "1".to_string()),
            ("maxItems", MAX_ITEMS.to_string()),
            ("sort", "asc".to_string()),
            ("locale", "en".to_string()),
            ("operation", "rent".to_string()),
            ("country", self.country.clone()),
            (self.identifier_type, self.identifier_value.clone()),
        ];

        let criteria = &self.criteria;
        if let Some(max_price) = criteria.max_price {
            pairs.push(("maxPrice", max_price.to_string()));
        }
        if let Some(min_price) = criteria.min_price {
            pairs.push(("minPrice", min_price.to_string()));
        }
        if let Some(min_rooms) = criteria.min_rooms {
            pairs.push(("minRooms", min_rooms.to_string()));
        }
        if !criteria.floor_types.is_empty() {
            let floors: Vec<&str> = criteria.floor_types.iter().map(|f| f.as_param()).collect();
            pairs.push(("floorHeights", floors.join(",")));
        }
        if criteria.require_air_conditioning == Some(true) {
            pairs.push(("airConditioning", "true".to_string()));
        }
        if criteria.require_elevator == Some(true) {
            pairs.push(("elevator", "true".to_string()));
        }

        pairs
    }
}

/// Body of `/auto-complete`
#[derive(Debug, Deserialize, Default)]
pub struct AutocompleteResponse {
    #[serde(default)]
    pub locations: Option<Vec<LocationCandidate>>,
}

/// Body of `/properties/list`; elements are kept raw and mapped field by field
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    #[serde(default)]
    pub element_list: Option<Vec<Value>>,
}
