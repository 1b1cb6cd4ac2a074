use scraper::{Html, Selector};

use super::squash_whitespace;

/// Pull the long-form description out of a listing's detail page.
///
/// Returns None when the description node is missing or empty; the
/// enrich stage treats that as "skip this listing", not as an error.
pub fn parse_long_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#viewad-description-text").expect("valid selector");
    let node = document.select(&selector).next()?;

    // Flatten the node's markup (<br>, lists, entities) into plain text,
    // then collapse the wrapping back out.
    let text = match html2text::from_read(node.inner_html().as_bytes(), 80) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Failed to convert description HTML to text: {}", e);
            return None;
        }
    };

    let cleaned = squash_whitespace(&text);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
