mod extractor;

pub use extractor::{build_prompt, parse_attributes, ClaudeClient, ModelClient};
