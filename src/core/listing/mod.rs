pub mod address;
pub mod store;
pub mod types;

pub use address::{listing_id_for, normalize_address};
pub use store::{ListingStore, SqliteListingStore};
pub use types::*;
