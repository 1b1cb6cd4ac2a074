use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes derived from a listing's free text by Claude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingAnalysis {
    pub listing_id: String,
    pub iphone_model: String,
    pub storage_gb: Option<i64>,
    pub rating: Option<i64>,
    pub highlights: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Parsed form of the model's four-line response, before it is keyed
/// to a listing and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAttributes {
    pub iphone_model: String,
    pub storage_gb: Option<i64>,
    pub rating: Option<i64>,
    pub highlights: String,
}
