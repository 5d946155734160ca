//! Retryable-error classification for upstream provider failures.
//!
//! Only retryable failures (rate limits, timeouts, gateway errors, dropped
//! connections) count against a candidate. Everything else, including a
//! missing error descriptor, leaves failover state untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HTTP statuses treated as transient.
pub const RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 408, 524];

/// Socket-level error codes treated as transient.
pub const RETRYABLE_ERROR_CODES: &[&str] = &[
    "ECONNABORTED",
    "ETIMEDOUT",
    "ENOTFOUND",
    "ECONNREFUSED",
    "ECONNRESET",
];

/// Lowercase message fragments treated as transient.
const RETRYABLE_MESSAGE_PATTERNS: &[&str] = &["timeout", "rate limit", "too many requests"];

/// Opaque description of an upstream failure. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Status nested inside an HTTP response object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why an error was classified as retryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RetryReason {
    Status(u16),
    Code(String),
    Message(&'static str),
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status {status}"),
            Self::Code(code) => write!(f, "code {code}"),
            Self::Message(pattern) => write!(f, "message contains '{pattern}'"),
        }
    }
}

impl ErrorInfo {
    pub fn from_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Build from a loosely shaped JSON error, as produced by HTTP clients
    /// and upstream error bodies.
    ///
    /// Recognized fields: `status` / `statusCode` / `response_status`,
    /// `response.status`, `code`, and `message` / `error.message`. Numeric
    /// strings are accepted for statuses; anything unrecognized is ignored.
    pub fn from_json(value: &Value) -> Self {
        let status = ["status", "statusCode", "status_code"]
            .iter()
            .find_map(|key| value.get(*key).and_then(status_from_value));
        let response_status = value
            .get("response_status")
            .and_then(status_from_value)
            .or_else(|| {
                value
                    .get("response")
                    .and_then(|r| r.get("status"))
                    .and_then(status_from_value)
            });
        let code = value
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| {
                value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string);
        Self {
            status,
            response_status,
            code,
            message,
        }
    }

    /// First matching retryable signal: status, then code, then message.
    pub fn retry_reason(&self) -> Option<RetryReason> {
        for status in [self.status, self.response_status].into_iter().flatten() {
            if RETRYABLE_STATUS_CODES.contains(&status) {
                return Some(RetryReason::Status(status));
            }
        }

        if let Some(code) = self.code.as_deref() {
            if RETRYABLE_ERROR_CODES.contains(&code) {
                return Some(RetryReason::Code(code.to_string()));
            }
        }

        if let Some(message) = self.message.as_deref() {
            let lowered = message.to_lowercase();
            if let Some(pattern) = RETRYABLE_MESSAGE_PATTERNS
                .iter()
                .find(|p| lowered.contains(*p))
            {
                return Some(RetryReason::Message(*pattern));
            }
        }

        None
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_reason().is_some()
    }
}

/// Absent errors are never retryable.
pub fn is_retryable(error: Option<&ErrorInfo>) -> bool {
    error.is_some_and(ErrorInfo::is_retryable)
}

fn status_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
