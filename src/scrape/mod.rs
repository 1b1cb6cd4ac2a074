mod detail;
mod fetcher;
mod search;

pub use detail::parse_long_description;
pub use fetcher::{HtmlFetcher, PageFetcher};
pub use search::parse_search_results;

/// Collapse runs of whitespace (including newlines) into single spaces.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
