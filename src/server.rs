use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::SearchError;
use crate::models::{value_to_text, FilterCriteria, ListingRecord};
use crate::scheduler::NewListings;
use crate::search::{RentalSearch, SearchRequest};
use crate::snapshot::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<RentalSearch>,
    pub store: Arc<dyn SnapshotStore>,
    pub new_listings: watch::Receiver<NewListings>,
}

/// Search form; every field is optional text so blanks can mean "no constraint"
#[derive(Debug, Default, Deserialize)]
pub struct SearchForm {
    #[serde(default, deserialize_with = "form_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "form_text")]
    pub districts: Option<String>,
    #[serde(default, deserialize_with = "form_text")]
    pub max_price: Option<String>,
    #[serde(default, deserialize_with = "form_text")]
    pub min_price: Option<String>,
    #[serde(default, deserialize_with = "form_text")]
    pub min_rooms: Option<String>,
    #[serde(default)]
    pub floor_types: Vec<String>,
    #[serde(default, deserialize_with = "form_text")]
    pub elevator: Option<String>,
    #[serde(default, deserialize_with = "form_text")]
    pub air_conditioning: Option<String>,
}

/// Accept numbers and booleans where the web form would send text
fn form_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.map(|v| value_to_text(&v)))
}

impl SearchForm {
    pub fn into_request(self) -> Result<SearchRequest, SearchError> {
        let criteria = FilterCriteria::from_form(
            self.max_price.as_deref(),
            self.min_price.as_deref(),
            self.min_rooms.as_deref(),
            &self.floor_types,
            self.elevator.as_deref(),
            self.air_conditioning.as_deref(),
        )?;

        Ok(SearchRequest {
            city: self.city.unwrap_or_default(),
            districts: self.districts.unwrap_or_default(),
            criteria,
        })
    }
}

/// Request failures rendered as `{"error": ...}`
pub enum ApiError {
    Search(SearchError),
    /// Body that could not be read as a search form
    Body(JsonRejection),
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        Self::Search(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Body(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Search(e) => {
                let status = match &e {
                    e if e.is_input_error() => StatusCode::BAD_REQUEST,
                    SearchError::NoMatchesFound | SearchError::NoPropertiesFound => {
                        StatusCode::NOT_FOUND
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!("Search failed: {}", e);
                }
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", post(search_handler))
        .route("/api/properties", get(properties_handler))
        .route("/api/new-listings", get(new_listings_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn search_handler(
    State(state): State<AppState>,
    form: Result<Json<SearchForm>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(form) = form?;
    let request = form.into_request()?;
    let outcome = state.search.run(&request).await?;

    Ok(Json(json!({
        "success": true,
        "results": outcome.results,
        "file": outcome.snapshot.path.display().to_string(),
        "zoi_id": outcome.zoi_id,
        "location_id": outcome.location_id,
    })))
}

/// Records of the latest snapshot, straight from the store
async fn properties_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingRecord>>, ApiError> {
    let snapshot = state
        .store
        .load_latest()
        .await
        .map_err(SearchError::Persistence)?;
    Ok(Json(snapshot.map(|s| s.records).unwrap_or_default()))
}

async fn new_listings_handler(State(state): State<AppState>) -> Json<Vec<ListingRecord>> {
    let latest = state.new_listings.borrow().clone();
    Json(latest.as_ref().clone())
}
