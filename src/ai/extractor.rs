use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ExtractedAttributes;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

/// Single completion call. The analyze stage depends on this seam so
/// tests can count invocations and feed canned responses.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

pub struct ClaudeClient {
    client: Client,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key }
    }
}

#[async_trait]
impl ModelClient for ClaudeClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens: 256,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ClaudeApi(format!("API error: {}", error_text)));
        }

        let message_response: MessageResponse = response.json().await?;

        let text = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}

/// Build the extraction prompt. The four-line template below is a contract
/// with `parse_attributes`; change them together or not at all.
pub fn build_prompt(title: &str, long_desc: &str) -> String {
    // Truncate oversized descriptions on a char boundary
    let mut cut = long_desc.len().min(10_000);
    while !long_desc.is_char_boundary(cut) {
        cut -= 1;
    }

    format!(
        "You are analyzing a classified ad for a used iPhone. The listing may be in German.\n\
         Respond with exactly four lines and nothing else:\n\
         Model: <the iPhone model, e.g. \"iPhone 12 Pro\", or Unknown>\n\
         Storage: <the storage size in GB as a plain number, or Unknown>\n\
         Rating: <condition rating from 1 (broken) to 5 (like new)>\n\
         Highlights: <one sentence of evidence for the rating, quoting the listing>\n\
         \n\
         Title: {}\n\
         Description: {}",
        title,
        &long_desc[..cut]
    )
}

/// Parse the model's four-line response into typed fields.
///
/// Every line is matched independently and degrades to its default when
/// absent or malformed; a reordered or partial response never fails, it
/// just yields fewer attributes.
pub fn parse_attributes(text: &str) -> ExtractedAttributes {
    ExtractedAttributes {
        iphone_model: line_value(text, "Model")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        storage_gb: line_value(text, "Storage").and_then(|v| parse_storage(&v)),
        rating: parse_rating(text),
        highlights: line_value(text, "Highlights").unwrap_or_default(),
    }
}

fn line_value(text: &str, label: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?im)^\s*{}:\s*(.+)$", label)).ok()?;
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// "Unknown" (any case) and anything non-numeric map to None. A trailing
/// "GB" unit is tolerated since models like to include it.
fn parse_storage(value: &str) -> Option<i64> {
    if value.eq_ignore_ascii_case("unknown") {
        return None;
    }
    let normalized = value.to_ascii_lowercase();
    normalized.trim_end_matches("gb").trim().parse().ok()
}

/// A single digit after "Rating:", taken as-is. The prompt constrains the
/// range to 1-5; the parser does not re-clamp, it only rejects non-digits.
fn parse_rating(text: &str) -> Option<i64> {
    let re = Regex::new(r"(?im)^\s*rating:\s*(\d)\b").ok()?;
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
