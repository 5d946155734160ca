//! Pluggable routers consulted before the built-in heuristic chain.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ccr_config::{PromptRule, RouterConfig};
use ccr_core::{ChatRequest, RouterTarget};
use regex::Regex;
use tracing::debug;

/// User-supplied routing hook.
///
/// Returning `Ok(None)` defers to the built-in chain. Errors are logged by the
/// caller and also defer to the built-in chain; they never fail the request.
#[async_trait]
pub trait CustomRouter: Send + Sync {
    async fn route(
        &self,
        request: &ChatRequest,
        config: &RouterConfig,
        token_count: u64,
    ) -> Result<Option<RouterTarget>>;
}

/// Routes on regular expressions matched against the latest user message.
///
/// Rules are tried in order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct PromptRuleRouter {
    rules: Vec<(Regex, RouterTarget)>,
}

impl PromptRuleRouter {
    pub fn from_rules(rules: &[PromptRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let regex = Regex::new(&rule.pattern).with_context(|| {
                    format!("Invalid prompt rule #{index} pattern: {}", rule.pattern)
                })?;
                Ok((regex, rule.target.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First target whose pattern matches `text`.
    pub fn match_text(&self, text: &str) -> Option<&RouterTarget> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(text))
            .map(|(regex, target)| {
                debug!(pattern = %regex, target = %target, "Prompt rule matched");
                target
            })
    }
}

#[async_trait]
impl CustomRouter for PromptRuleRouter {
    async fn route(
        &self,
        request: &ChatRequest,
        _config: &RouterConfig,
        _token_count: u64,
    ) -> Result<Option<RouterTarget>> {
        Ok(request
            .last_user_text()
            .and_then(|text| self.match_text(&text).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(pattern: &str, target: RouterTarget) -> PromptRule {
        PromptRule {
            pattern: pattern.to_string(),
            target,
        }
    }

    fn request_with_user_text(text: &str) -> ChatRequest {
        serde_json::from_value(json!({
            "model": "m",
            "messages": [
                {"role": "user", "content": "earlier question about rust"},
                {"role": "assistant", "content": "answer"},
                {"role": "user", "content": [{"type": "text", "text": text}]}
            ]
        }))
        .expect("valid request")
    }

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let router = PromptRuleRouter::from_rules(&[
            rule(r"(?i)\bimage\b", RouterTarget::from("gemini,gemini-2.5-pro")),
            rule(
                r"(?i)translate",
                RouterTarget::from(vec!["a,x".to_string(), "b,y".to_string()]),
            ),
            rule(r".*", RouterTarget::from("catch-all")),
        ])
        .unwrap();
        let config = RouterConfig::default();

        let req = request_with_user_text("Please describe this IMAGE");
        let target = router.route(&req, &config, 0).await.unwrap();
        assert_eq!(target, Some(RouterTarget::from("gemini,gemini-2.5-pro")));

        let req = request_with_user_text("translate to French");
        let target = router.route(&req, &config, 0).await.unwrap();
        assert_eq!(target.map(|t| t.identifiers().len()), Some(2));
    }

    #[tokio::test]
    async fn test_only_latest_user_message_is_matched() {
        let router =
            PromptRuleRouter::from_rules(&[rule("rust", RouterTarget::from("rusty"))]).unwrap();
        let req = request_with_user_text("something else");
        let target = router
            .route(&req, &RouterConfig::default(), 0)
            .await
            .unwrap();
        assert_eq!(target, None);
    }

    #[tokio::test]
    async fn test_no_user_message_defers() {
        let router = PromptRuleRouter::from_rules(&[rule(".*", RouterTarget::from("x"))]).unwrap();
        let target = router
            .route(&ChatRequest::new("m"), &RouterConfig::default(), 0)
            .await
            .unwrap();
        assert_eq!(target, None);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = PromptRuleRouter::from_rules(&[rule("(unclosed", RouterTarget::from("x"))])
            .unwrap_err();
        assert!(err.to_string().contains("prompt rule #0"));
    }

    #[test]
    fn test_empty_rules() {
        let router = PromptRuleRouter::from_rules(&[]).unwrap();
        assert!(router.is_empty());
        assert_eq!(router.match_text("anything"), None);
    }
}
