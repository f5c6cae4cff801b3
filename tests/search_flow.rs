use async_trait::async_trait;
use rental_scout::error::ProviderError;
use rental_scout::provider::{ListingFetch, ListingQuery, LocationLookup};
use rental_scout::{
    ChangeDetector, CsvSnapshotStore, DisambiguationMode, FilterCriteria, LocationCandidate,
    RentalSearch, SearchError, SearchRequest, SnapshotStore,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Canned provider: a few Madrid locations and two listings per location
#[derive(Default)]
struct FakeProvider {
    prefixes: Mutex<Vec<String>>,
    queries: Mutex<Vec<ListingQuery>>,
    extra_listing: Mutex<Option<String>>,
}

#[async_trait]
impl LocationLookup for FakeProvider {
    async fn autocomplete(
        &self,
        prefix: &str,
        _country: &str,
    ) -> Result<Vec<LocationCandidate>, ProviderError> {
        self.prefixes.lock().unwrap().push(prefix.to_string());
        let locations = match prefix {
            "Retiro" => json!([
                {
                    "name": "Retiro, Madrid",
                    "subType": "district",
                    "zoiId": "zoi-retiro",
                    "locationId": "0-EU-ES-28-07-001-079-03"
                },
                {"name": "Retiro, Buenos Aires", "subType": "district", "locationId": "ar-1"}
            ]),
            "Salamanca" => json!([
                {
                    "name": "Metro Salamanca, Madrid",
                    "subType": "metro zone",
                    "zoiId": "zoi-metro-salamanca"
                },
                {
                    "name": "Salamanca, Madrid",
                    "subType": "district",
                    "locationId": "0-EU-ES-28-07-001-079-04"
                },
                {"name": "Salamanca", "subType": "province", "locationId": "0-EU-ES-37"}
            ]),
            _ => json!([]),
        };
        Ok(serde_json::from_value(locations).unwrap())
    }
}

#[async_trait]
impl ListingFetch for FakeProvider {
    async fn list_properties(&self, query: &ListingQuery) -> Result<Vec<Value>, ProviderError> {
        self.queries.lock().unwrap().push(query.clone());
        let id = &query.identifier_value;
        let mut elements = vec![
            json!({
                "url": format!("https://www.idealista.com/inmueble/{}-1/", id),
                "price": 1200.0,
                "rooms": 2
            }),
            json!({"url": format!("https://www.idealista.com/inmueble/{}-2/", id), "price": 950.0}),
        ];
        if let Some(url) = self.extra_listing.lock().unwrap().clone() {
            if id == "zoi-retiro" {
                elements.push(json!({"url": url}));
            }
        }
        Ok(elements)
    }

    fn source_name(&self) -> &'static str {
        "Fake"
    }
}

fn rental_search(provider: &Arc<FakeProvider>, store: &Arc<CsvSnapshotStore>) -> RentalSearch {
    RentalSearch::new(
        provider.clone(),
        provider.clone(),
        store.clone(),
        "es",
        DisambiguationMode::Automatic,
    )
}

fn request(districts: &str) -> SearchRequest {
    SearchRequest {
        city: "Madrid".to_string(),
        districts: districts.to_string(),
        criteria: FilterCriteria::default(),
    }
}

#[tokio::test]
async fn madrid_search_tags_records_with_their_district() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::default());
    let store = Arc::new(CsvSnapshotStore::new(dir.path()));

    let outcome = rental_search(&provider, &store)
        .run(&request("Retiro\nSalamanca"))
        .await
        .unwrap();

    assert_eq!(*provider.prefixes.lock().unwrap(), vec!["Retiro", "Salamanca"]);

    // Retiro (1 location) + Salamanca metro zone and district (2 locations)
    assert_eq!(outcome.results.len(), 6);
    let districts: Vec<&str> = outcome.results.iter().map(|r| r.district.as_str()).collect();
    assert_eq!(
        districts,
        vec!["retiro", "retiro", "salamanca", "salamanca", "salamanca", "salamanca"]
    );
    assert_eq!(outcome.zoi_id, "zoi-retiro");

    let queries = provider.queries.lock().unwrap();
    let ids: Vec<(&str, &str)> = queries
        .iter()
        .map(|q| (q.identifier_type, q.identifier_value.as_str()))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("zoiId", "zoi-retiro"),
            ("zoiId", "zoi-metro-salamanca"),
            ("locationId", "0-EU-ES-28-07-001-079-04"),
        ]
    );

    let saved = store.load_latest().await.unwrap().unwrap();
    assert_eq!(saved.records, outcome.results);
}

#[tokio::test]
async fn blank_input_fails_before_any_lookup() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::default());
    let store = Arc::new(CsvSnapshotStore::new(dir.path()));
    let search = rental_search(&provider, &store);

    let err = search.run(&request("\n  \n")).await.unwrap_err();
    assert!(matches!(err, SearchError::NoDistrictsProvided));

    let err = search
        .run(&SearchRequest {
            city: "  ".to_string(),
            districts: "Retiro".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::BlankCity));

    assert!(provider.prefixes.lock().unwrap().is_empty());
    assert!(store.load_latest().await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_districts_report_no_matches() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::default());
    let store = Arc::new(CsvSnapshotStore::new(dir.path()));

    let err = rental_search(&provider, &store)
        .run(&request("Atlantis"))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::NoMatchesFound));
}

#[tokio::test]
async fn repeated_searches_surface_only_new_listings() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::default());
    let store = Arc::new(CsvSnapshotStore::new(dir.path()));
    let search = rental_search(&provider, &store);
    let mut detector = ChangeDetector::new(store.clone());

    search.run(&request("Retiro")).await.unwrap();
    assert!(detector.detect_new_listings().await.unwrap().is_empty());

    *provider.extra_listing.lock().unwrap() =
        Some("https://www.idealista.com/inmueble/new/".to_string());
    search.run(&request("Retiro")).await.unwrap();

    let new = detector.detect_new_listings().await.unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].url, "https://www.idealista.com/inmueble/new/");
    assert_eq!(new[0].district, "retiro");
}
