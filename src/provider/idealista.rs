use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ProviderError;
use crate::models::LocationCandidate;
use crate::provider::traits::{ListingFetch, LocationLookup};
use crate::provider::types::{AutocompleteResponse, ListingQuery, ListingResponse};

/// Idealista listing API, reached through RapidAPI
pub struct IdealistaClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_host: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl IdealistaClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .rapidapi_key
            .clone()
            .context("RAPIDAPI_KEY must be set to query the listing provider")?;

        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("rental-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            api_key,
            api_host: config.rapidapi_host.clone(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// GET with bounded retries and exponential backoff on retryable failures
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match self.get_once(endpoint, query).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_backoff, attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        endpoint,
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Fetching {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.api_host)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("{} returned status: {}", endpoint, status);
            return Err(ProviderError::Status { status, body });
        }

        debug!("Response from {}: {}", endpoint, body);
        Ok(serde_json::from_str(&body)?)
    }
}

/// Wait before retry number `attempt + 1`; doubles from `base` each time
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

#[async_trait]
impl LocationLookup for IdealistaClient {
    async fn autocomplete(
        &self,
        prefix: &str,
        country: &str,
    ) -> Result<Vec<LocationCandidate>, ProviderError> {
        let query = [("prefix", prefix.to_string()), ("country", country.to_string())];
        let response: AutocompleteResponse = self.get_json("/auto-complete", &query).await?;
        Ok(response.locations.unwrap_or_default())
    }
}

#[async_trait]
impl ListingFetch for IdealistaClient {
    async fn list_properties(&self, query: &ListingQuery) -> Result<Vec<Value>, ProviderError> {
        let pairs = query.to_query_pairs();
        let response: ListingResponse = self.get_json("/properties/list", &pairs).await?;
        Ok(response.element_list.unwrap_or_default())
    }

    fn source_name(&self) -> &'static str {
        "Idealista"
    }
}
