//! Request token counting.
//!
//! Walks every text-bearing field of a request and sums a tokenizer's count.
//! Missing or oddly shaped fields contribute zero instead of failing.

use ccr_core::{ChatRequest, SystemPrompt};
use serde_json::Value;

/// Pluggable tokenizer.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> u64;
}

/// `cl100k_base` BPE via `tiktoken-rs`. The encoder loads lazily on first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiktokenCounter;

impl TiktokenCounter {
    /// Load the encoder outside the request path.
    pub fn preload() {
        let _ = tiktoken_rs::cl100k_base_singleton();
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        tiktoken_rs::cl100k_base_singleton()
            .encode_with_special_tokens(text)
            .len() as u64
    }
}

/// Rough estimate: one token per four characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharEstimateCounter;

impl TokenCounter for CharEstimateCounter {
    fn count(&self, text: &str) -> u64 {
        (text.chars().count() as u64).div_ceil(4)
    }
}

/// Sum token counts over messages, system prompt, and tool declarations.
pub fn count_request_tokens(request: &ChatRequest, counter: &dyn TokenCounter) -> u64 {
    let messages: u64 = request
        .messages
        .iter()
        .map(|m| count_content(&m.content, counter))
        .sum();

    let system = match &request.system {
        Some(SystemPrompt::Text(text)) => counter.count(text),
        Some(SystemPrompt::Blocks(blocks)) => blocks
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| count_text_value(&b.text, counter))
            .sum(),
        Some(SystemPrompt::Other(_)) | None => 0,
    };

    let tools: u64 = request
        .tools
        .iter()
        .map(|tool| {
            let described = match tool.description.as_str() {
                Some(description) => {
                    let name = tool.name.as_str().unwrap_or_default();
                    counter.count(&format!("{name}{description}"))
                }
                None => 0,
            };
            let schema = tool
                .input_schema
                .as_ref()
                .map_or(0, |schema| counter.count(&schema.to_string()));
            described + schema
        })
        .sum();

    messages + system + tools
}

fn count_content(content: &Value, counter: &dyn TokenCounter) -> u64 {
    match content {
        Value::String(text) => counter.count(text),
        Value::Array(blocks) => blocks.iter().map(|b| count_block(b, counter)).sum(),
        _ => 0,
    }
}

fn count_block(block: &Value, counter: &dyn TokenCounter) -> u64 {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => block
            .get("text")
            .and_then(Value::as_str)
            .map_or(0, |text| counter.count(text)),
        Some("tool_use") => block
            .get("input")
            .map_or(0, |input| counter.count(&input.to_string())),
        Some("tool_result") => match block.get("content") {
            Some(Value::String(text)) => counter.count(text),
            Some(Value::Null) | None => 0,
            Some(other) => counter.count(&other.to_string()),
        },
        _ => 0,
    }
}

/// System block text may be a string or an array of strings.
fn count_text_value(text: &Value, counter: &dyn TokenCounter) -> u64 {
    match text {
        Value::String(text) => counter.count(text),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .map(|part| counter.count(part))
            .sum(),
        _ => 0,
    }
}
