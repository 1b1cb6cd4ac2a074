use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored classified ad, keyed by the source site's article id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub article_id: String,
    pub title: String,
    /// Display string as shown on the site, currency suffix included ("250 € VB").
    pub price: String,
    pub location: String,
    /// The site's own display string ("Heute, 14:32"), not parsed.
    pub posted_at: String,
    pub description: String,
    pub long_desc: Option<String>,
    pub url: String,
    pub thumbnail_url: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// The partial record visible on a search-results page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedListing {
    pub article_id: String,
    pub title: String,
    pub price: String,
    pub location: String,
    pub posted_at: String,
    pub description: String,
    pub url: String,
    pub thumbnail_url: String,
}

/// One row of the append-only price/title change ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub listing_id: String,
    pub price: String,
    pub title: String,
    pub changed_at: DateTime<Utc>,
}
