use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rental_scout::error::ProviderError;
use rental_scout::provider::{ListingFetch, ListingQuery, LocationLookup};
use rental_scout::scheduler::NewListings;
use rental_scout::server::{build_app, AppState};
use rental_scout::{
    CsvSnapshotStore, DisambiguationMode, ListingRecord, LocationCandidate, RentalSearch,
    SnapshotStore,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use tokio::sync::watch;
use tower::ServiceExt;

#[derive(Default)]
struct FakeProvider {
    queries: Mutex<Vec<Vec<(&'static str, String)>>>,
}

#[async_trait]
impl LocationLookup for FakeProvider {
    async fn autocomplete(
        &self,
        prefix: &str,
        _country: &str,
    ) -> Result<Vec<LocationCandidate>, ProviderError> {
        let locations = if prefix == "Retiro" {
            json!([{"name": "Retiro, Madrid", "subType": "district", "locationId": "loc-retiro"}])
        } else {
            json!([])
        };
        Ok(serde_json::from_value(locations).unwrap())
    }
}

#[async_trait]
impl ListingFetch for FakeProvider {
    async fn list_properties(&self, query: &ListingQuery) -> Result<Vec<Value>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_query_pairs());
        if query.criteria.max_price == Some(1) {
            return Ok(vec![]);
        }
        Ok(vec![json!({"url": "https://www.idealista.com/inmueble/1/", "price": 1000.0})])
    }

    fn source_name(&self) -> &'static str {
        "Fake"
    }
}

struct TestApp {
    app: Router,
    provider: Arc<FakeProvider>,
    store: Arc<CsvSnapshotStore>,
    new_listings: watch::Sender<NewListings>,
    _dir: TempDir,
}

fn test_app() -> TestApp {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::default());
    let store = Arc::new(CsvSnapshotStore::new(dir.path()));
    let search = RentalSearch::new(
        provider.clone(),
        provider.clone(),
        store.clone(),
        "es",
        DisambiguationMode::Automatic,
    );
    let (tx, rx) = watch::channel(NewListings::default());
    let app = build_app(AppState {
        search: Arc::new(search),
        store: store.clone(),
        new_listings: rx,
    });
    TestApp {
        app,
        provider,
        store,
        new_listings: tx,
        _dir: dir,
    }
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn post_search(body: Value) -> Request<Body> {
    Request::post("/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn search_returns_results_and_snapshot_file() {
    let t = test_app();
    let (status, json) = call(
        t.app,
        post_search(json!({"city": "Madrid", "districts": "Retiro", "min_price": ""})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
    assert_eq!(json["results"][0]["district"], "retiro");
    assert_eq!(json["location_id"], "loc-retiro");
    assert_eq!(json["zoi_id"], "N/A");
    assert!(json["file"].as_str().unwrap().contains("results_"));

    {
        let queries = t.provider.queries.lock().unwrap();
        assert!(!queries[0].iter().any(|(k, _)| *k == "minPrice"));
    }
    assert!(t.store.load_latest().await.unwrap().is_some());
}

#[tokio::test]
async fn search_without_districts_is_a_bad_request() {
    let t = test_app();
    let (status, json) =
        call(t.app, post_search(json!({"city": "Madrid", "districts": " \n "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No districts provided");
}

#[tokio::test]
async fn malformed_search_body_is_a_json_bad_request() {
    let t = test_app();
    let request = Request::post("/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"city": "Madrid", "districts": "#))
        .unwrap();
    let (status, json) = call(t.app.clone(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("JSON"));
    assert!(t.provider.queries.lock().unwrap().is_empty());

    let untyped = Request::post("/search")
        .body(Body::from(json!({"city": "Madrid"}).to_string()))
        .unwrap();
    let (status, json) = call(t.app, untyped).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn search_with_no_properties_reports_it() {
    let t = test_app();
    let (status, json) = call(
        t.app,
        post_search(json!({"city": "Madrid", "districts": "Retiro", "max_price": "1"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "No properties found with the specified criteria");
    assert!(t.store.load_latest().await.unwrap().is_none());
}

#[tokio::test]
async fn properties_serve_the_latest_snapshot() {
    let t = test_app();
    let (status, json) = call(t.app.clone(), get("/api/properties")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let record = ListingRecord {
        url: "https://www.idealista.com/inmueble/7/".to_string(),
        district: "retiro".to_string(),
        ..Default::default()
    };
    t.store.save(&[record]).await.unwrap();

    let (_, json) = call(t.app, get("/api/properties")).await;
    assert_eq!(json[0]["url"], "https://www.idealista.com/inmueble/7/");
}

#[tokio::test]
async fn new_listings_serve_the_published_delta() {
    let t = test_app();
    t.new_listings.send_replace(Arc::new(vec![ListingRecord {
        url: "https://www.idealista.com/inmueble/9/".to_string(),
        ..Default::default()
    }]));

    let (status, json) = call(t.app, get("/api/new-listings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["url"], "https://www.idealista.com/inmueble/9/");
}
