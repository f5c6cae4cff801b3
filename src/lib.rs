//! Rental listing search across city districts, with snapshot-based
//! detection of newly published listings.

pub mod config;
pub mod console;
pub mod detector;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod query;
pub mod resolver;
pub mod scheduler;
pub mod search;
pub mod server;
pub mod snapshot;

pub use detector::ChangeDetector;
pub use error::{ProviderError, SearchError, SnapshotError};
pub use models::{FilterCriteria, FloorType, ListingRecord, LocationCandidate, Snapshot};
pub use resolver::{DisambiguationMode, LocationChooser, LocationResolver};
pub use search::{RentalSearch, SearchRequest};
pub use snapshot::{CsvSnapshotStore, SnapshotStore};
