//! Chat-completion request model (Anthropic Messages shape).
//!
//! Only the fields routing looks at are typed. Message content, unknown
//! top-level keys, and fields a client may send in an unexpected shape stay as
//! raw JSON, so any object with a string `model` deserializes and survives a
//! deserialize/serialize pass without losing anything the upstream needs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Delimiter between the user part and the session part of `metadata.user_id`.
pub const SESSION_DELIMITER: &str = "_session_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
    /// Only `metadata.user_id` is read; other keys pass through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// A string in well-formed requests.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub role: Value,
    /// Either a plain string or an array of content blocks.
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<SystemBlock>),
    /// Any other shape; kept verbatim and ignored by routing.
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemBlock {
    #[serde(rename = "type", default = "default_block_type")]
    pub kind: String,
    /// Usually a string; some clients send an array of strings.
    #[serde(default)]
    pub text: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_block_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDecl {
    /// `kind`, `name` and `description` are strings in well-formed requests.
    #[serde(rename = "type", default, skip_serializing_if = "Value::is_null")]
    pub kind: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub name: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub description: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    /// Minimal request with just a model name, handy for tests and tooling.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            tools: Vec::new(),
            thinking: None,
            metadata: None,
            extra: Map::new(),
        }
    }

    /// Session identifier embedded in `metadata.user_id` after [`SESSION_DELIMITER`].
    ///
    /// `"user_abc_account__session_1234"` yields `Some("1234")`. An id with no
    /// delimiter, an empty session part, or a non-string id yields `None`.
    pub fn session_id(&self) -> Option<&str> {
        let user_id = self.metadata.as_ref()?.get("user_id")?.as_str()?;
        user_id
            .split(SESSION_DELIMITER)
            .nth(1)
            .filter(|id| !id.is_empty())
    }

    /// Whether the request asks for extended thinking.
    pub fn thinking_requested(&self) -> bool {
        !matches!(self.thinking, None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    /// Whether any declared tool's type starts with `prefix`.
    pub fn has_tool_type_prefix(&self, prefix: &str) -> bool {
        self.tools
            .iter()
            .any(|tool| tool.kind.as_str().is_some_and(|k| k.starts_with(prefix)))
    }

    /// Plain text of the most recent user message (text blocks joined by newlines).
    pub fn last_user_text(&self) -> Option<String> {
        let message = self.messages.iter().rev().find(|m| m.role == "user")?;
        match &message.content {
            Value::String(text) => Some(text.clone()),
            Value::Array(blocks) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.join("\n"))
                }
            }
            _ => None,
        }
    }
}
