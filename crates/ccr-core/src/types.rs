use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A router configuration value: one provider identifier, or an ordered
/// list of candidates that needs failover resolution.
///
/// Deserializes from either a bare string or an array of strings:
///
/// ```toml
/// default = "openrouter,anthropic/claude-sonnet-4"
/// think = ["deepseek,deepseek-reasoner", "openrouter,anthropic/claude-opus-4"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouterTarget {
    Single(String),
    Candidates(Vec<String>),
}

impl RouterTarget {
    /// First identifier of the target, used as the last-resort fallback.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Candidates(list) => list.first().map(String::as_str),
        }
    }

    /// Every identifier named by this target, in order.
    pub fn identifiers(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Candidates(list) => list.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(value) => value.trim().is_empty(),
            Self::Candidates(list) => list.is_empty(),
        }
    }
}

impl fmt::Display for RouterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => f.write_str(value),
            Self::Candidates(list) => write!(f, "[{}]", list.join(", ")),
        }
    }
}

impl From<&str> for RouterTarget {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for RouterTarget {
    fn from(list: Vec<String>) -> Self {
        Self::Candidates(list)
    }
}

/// Which routing rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// A registered custom router strategy picked the model.
    Custom,
    /// The request named `provider,model` itself.
    Explicit,
    LongContext,
    SubAgent,
    Background,
    Think,
    WebSearch,
    Default,
    /// The policy chain failed and the default route was used as a fallback.
    Fallback,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Explicit => "explicit",
            Self::LongContext => "long_context",
            Self::SubAgent => "sub_agent",
            Self::Background => "background",
            Self::Think => "think",
            Self::WebSearch => "web_search",
            Self::Default => "default",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for CLI responses
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_target_from_string() {
        let target: RouterTarget = serde_json::from_str(r#""deepseek,deepseek-chat""#).unwrap();
        assert_eq!(target, RouterTarget::Single("deepseek,deepseek-chat".into()));
    }

    #[test]
    fn test_router_target_from_list() {
        let target: RouterTarget = serde_json::from_str(r#"["a,m1", "b,m2"]"#).unwrap();
        assert_eq!(
            target,
            RouterTarget::Candidates(vec!["a,m1".into(), "b,m2".into()])
        );
        assert_eq!(target.first(), Some("a,m1"));
        assert_eq!(target.identifiers(), vec!["a,m1", "b,m2"]);
    }

    #[test]
    fn test_router_target_empty() {
        assert!(RouterTarget::Candidates(vec![]).is_empty());
        assert!(RouterTarget::Single("  ".into()).is_empty());
        assert!(!RouterTarget::from("x").is_empty());
        assert_eq!(RouterTarget::Candidates(vec![]).first(), None);
    }

    #[test]
    fn test_router_target_display() {
        assert_eq!(RouterTarget::from("a,b").to_string(), "a,b");
        assert_eq!(
            RouterTarget::from(vec!["a".to_string(), "b".to_string()]).to_string(),
            "[a, b]"
        );
    }

    #[test]
    fn test_route_kind_serializes_snake_case() {
        let json = serde_json::to_string(&RouteKind::LongContext).unwrap();
        assert_eq!(json, r#""long_context""#);
        assert_eq!(RouteKind::WebSearch.to_string(), "web_search");
    }
}
