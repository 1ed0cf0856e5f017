pub mod listing;
pub mod segment;

pub use listing::*;
pub use segment::*;

// Display form of a field the scraper could not recover
pub const UNAVAILABLE: &str = "N/A";
