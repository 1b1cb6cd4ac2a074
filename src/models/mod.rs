mod analysis;
mod listing;

pub use analysis::{ExtractedAttributes, ListingAnalysis};
pub use listing::{Listing, PriceChange, ScrapedListing};
