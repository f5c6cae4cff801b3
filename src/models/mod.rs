use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::error::SearchError;
use crate::normalize::normalize;

/// A location returned by the provider's autocomplete endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationCandidate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sub_type: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub zoi_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub location_id: Option<String>,
}

impl LocationCandidate {
    /// Search scope for this location: zoiId wins over locationId
    pub fn identifier(&self) -> Option<(&'static str, &str)> {
        match (&self.zoi_id, &self.location_id) {
            (Some(zoi), _) => Some(("zoiId", zoi.as_str())),
            (None, Some(loc)) => Some(("locationId", loc.as_str())),
            (None, None) => None,
        }
    }

    pub fn is_metro_zone(&self) -> bool {
        self.sub_type.to_lowercase().contains("metro")
    }
}

/// Ids show up as strings or numbers depending on the endpoint; blanks count as missing.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| value_to_text(&v)).filter(|s| !s.trim().is_empty()))
}

/// A district as typed by the user, plus its matching key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DistrictQuery {
    pub raw_name: String,
    pub normalized_name: String,
}

impl DistrictQuery {
    pub fn new(raw: &str) -> Self {
        let raw_name = raw.trim().to_string();
        let normalized_name = normalize(&raw_name);
        Self {
            raw_name,
            normalized_name,
        }
    }
}

impl fmt::Display for DistrictQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_name)
    }
}

/// Resolved locations per district, in the order the districts were entered.
///
/// Built once by the resolver and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    entries: Vec<(DistrictQuery, Vec<LocationCandidate>)>,
    unmatched: Vec<DistrictQuery>,
}

impl ResolutionResult {
    pub(crate) fn new(
        entries: Vec<(DistrictQuery, Vec<LocationCandidate>)>,
        unmatched: Vec<DistrictQuery>,
    ) -> Self {
        Self { entries, unmatched }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DistrictQuery, &[LocationCandidate])> {
        self.entries
            .iter()
            .map(|(district, locations)| (district, locations.as_slice()))
    }

    /// Locations resolved for a district, looked up by its normalized name
    pub fn get(&self, normalized_name: &str) -> Option<&[LocationCandidate]> {
        self.entries
            .iter()
            .find(|(district, _)| district.normalized_name == normalized_name)
            .map(|(_, locations)| locations.as_slice())
    }

    /// Districts that ended without any usable location
    pub fn unmatched(&self) -> &[DistrictQuery] {
        &self.unmatched
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First location of the first matched district
    pub fn first_location(&self) -> Option<&LocationCandidate> {
        self.entries
            .iter()
            .find_map(|(_, locations)| locations.first())
    }
}

/// Floor height filter values understood by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FloorType {
    #[serde(rename = "topFloor")]
    Top,
    #[serde(rename = "intermediateFloor")]
    Intermediate,
    #[serde(rename = "groundFloor")]
    Ground,
}

impl FloorType {
    pub fn as_param(&self) -> &'static str {
        match self {
            FloorType::Top => "topFloor",
            FloorType::Intermediate => "intermediateFloor",
            FloorType::Ground => "groundFloor",
        }
    }

    /// Accepts the provider names as well as the short `top`/`intermediate`/`ground`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "top" | "topfloor" => Some(FloorType::Top),
            "intermediate" | "intermediatefloor" => Some(FloorType::Intermediate),
            "ground" | "groundfloor" => Some(FloorType::Ground),
            _ => None,
        }
    }
}

/// Search filters. `None`/empty means no constraint and is never sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterCriteria {
    pub max_price: Option<u32>,
    pub min_price: Option<u32>,
    pub min_rooms: Option<u32>,
    pub floor_types: BTreeSet<FloorType>,
    pub require_elevator: Option<bool>,
    pub require_air_conditioning: Option<bool>,
}

impl FilterCriteria {
    /// Build criteria from raw form values where blank means "no constraint"
    pub fn from_form(
        max_price: Option<&str>,
        min_price: Option<&str>,
        min_rooms: Option<&str>,
        floor_types: &[String],
        elevator: Option<&str>,
        air_conditioning: Option<&str>,
    ) -> Result<Self, SearchError> {
        let mut floors = BTreeSet::new();
        for raw in floor_types.iter().filter(|f| !f.trim().is_empty()) {
            let floor = FloorType::parse(raw).ok_or_else(|| SearchError::InvalidCriteria {
                field: "floor_types",
                value: raw.clone(),
            })?;
            floors.insert(floor);
        }

        Ok(Self {
            max_price: parse_positive("max_price", max_price)?,
            min_price: parse_positive("min_price", min_price)?,
            min_rooms: parse_positive("min_rooms", min_rooms)?,
            floor_types: floors,
            require_elevator: parse_flag(elevator),
            require_air_conditioning: parse_flag(air_conditioning),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.max_price.is_none()
            && self.min_price.is_none()
            && self.min_rooms.is_none()
            && self.floor_types.is_empty()
            && self.require_elevator.is_none()
            && self.require_air_conditioning.is_none()
    }
}

fn parse_positive(field: &'static str, raw: Option<&str>) -> Result<Option<u32>, SearchError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(SearchError::InvalidCriteria {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Checkbox-style flag: only an explicit yes turns the requirement on
fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("yes") | Some("true") | Some("on") | Some("1") => Some(true),
        _ => None,
    }
}

/// One rental listing, flattened from the provider response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub rooms: String,
    pub location_id: String,
    pub multimedia: Vec<String>,
    pub price: String,
    pub status: String,
    pub size: String,
    pub address: String,
    pub bathrooms: String,
    pub url: String,
    pub district: String,
}

impl ListingRecord {
    /// Map a provider element, defaulting every missing field to empty
    pub fn from_provider(element: &Value, district: &str) -> Self {
        let text = |key: &str| element.get(key).map(value_to_text).unwrap_or_default();

        Self {
            rooms: text("rooms"),
            location_id: text("locationId"),
            multimedia: element.get("multimedia").map(media_urls).unwrap_or_default(),
            price: text("price"),
            status: text("status"),
            size: text("size"),
            address: text("address"),
            bathrooms: text("bathrooms"),
            url: text("url"),
            district: district.to_string(),
        }
    }
}

/// Provider multimedia comes as `{"images": [{"url": ..}]}`, a bare list, or a single string
fn media_urls(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(media_urls).collect(),
        Value::Object(map) => {
            if let Some(Value::String(url)) = map.get("url") {
                return vec![url.clone()];
            }
            map.values()
                .filter(|v| v.is_array())
                .flat_map(media_urls)
                .collect()
        }
        _ => Vec::new(),
    }
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One immutable batch of listings captured at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub created_at: DateTime<Utc>,
    pub records: Vec<ListingRecord>,
}

/// Where a snapshot was written
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotHandle {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
}
