use thiserror::Error;

/// Errors surfaced by a rental search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("No city provided")]
    BlankCity,

    #[error("No districts provided")]
    NoDistrictsProvided,

    #[error("Invalid value for {field}: {value:?}")]
    InvalidCriteria { field: &'static str, value: String },

    #[error("No matching locations found for any district")]
    NoMatchesFound,

    #[error("No properties found with the specified criteria")]
    NoPropertiesFound,

    #[error("Failed to persist snapshot: {0}")]
    Persistence(#[from] SnapshotError),
}

impl SearchError {
    /// Input problems are reported before any provider call is made
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SearchError::BlankCity
                | SearchError::NoDistrictsProvided
                | SearchError::InvalidCriteria { .. }
        )
    }
}

/// Errors talking to the listing provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("JSON deserialization failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ProviderError {
    /// Transport failures, throttling and server errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            ProviderError::Decode(_) => false,
        }
    }
}

/// Errors reading or writing snapshot files
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid multimedia column: {0}")]
    Json(#[from] serde_json::Error),
}
