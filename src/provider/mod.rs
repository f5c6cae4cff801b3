pub mod idealista;
pub mod traits;
pub mod types;

pub use idealista::IdealistaClient;
pub use traits::{ListingFetch, LocationLookup};
pub use types::ListingQuery;
