//! Ordered model-selection heuristics.
//!
//! Rules are evaluated in a fixed priority order and the first match wins:
//! explicit `provider,model` override, long context, sub-agent marker,
//! background model, thinking, web search, default.

use ccr_config::RouterConfig;
use ccr_core::{ChatRequest, Result, RouteKind, RouterError, RouterTarget};
use ccr_scheduler::{FailoverManager, RoutingScope};
use serde::Serialize;
use tracing::debug;

use crate::subagent::take_subagent_model;
use crate::usage::Usage;

/// Current-request token floor for the long-context carry-over rule.
pub const LONG_CONTEXT_CARRYOVER_TOKENS: u64 = 20_000;

/// Requested models with this prefix are lightweight background calls.
pub const BACKGROUND_MODEL_PREFIX: &str = "claude-3-5-haiku";

/// Tool types with this prefix request web search.
pub const WEB_SEARCH_TOOL_PREFIX: &str = "web_search";

/// Model chosen by the policy and the rule that chose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub model: String,
    pub route: RouteKind,
}

impl Selection {
    pub fn new(model: impl Into<String>, route: RouteKind) -> Self {
        Self {
            model: model.into(),
            route,
        }
    }
}

/// Resolve a router configuration value to one identifier.
///
/// Single values pass through unchanged; lists go through failover rotation
/// for `scope`.
pub fn resolve(
    target: &RouterTarget,
    failover: &FailoverManager,
    scope: &RoutingScope,
) -> Result<String> {
    match target {
        RouterTarget::Single(value) => Ok(value.clone()),
        RouterTarget::Candidates(list) => failover.select_provider(list, scope),
    }
}

/// Run the heuristic chain for `request`.
///
/// May strip a sub-agent marker from the request's system prompt. Fails with
/// [`RouterError::Configuration`] when no rule matches and no default route
/// is configured, and with [`RouterError::InvalidInput`] when a matched route
/// is an empty candidate list.
pub fn select_model(
    request: &mut ChatRequest,
    token_count: u64,
    config: &RouterConfig,
    last_usage: Option<&Usage>,
    failover: &FailoverManager,
    scope: &RoutingScope,
) -> Result<Selection> {
    if request.model.contains(',') {
        return Ok(Selection::new(
            explicit_override(&request.model, config),
            RouteKind::Explicit,
        ));
    }

    let router = &config.router;
    let resolve_slot = |kind: RouteKind| -> Option<Result<Selection>> {
        let target = router.target(kind)?;
        Some(resolve(target, failover, scope).map(|model| Selection::new(model, kind)))
    };

    let threshold = router.long_context_threshold;
    let carried_over = last_usage.is_some_and(|usage| usage.input_tokens > threshold)
        && token_count > LONG_CONTEXT_CARRYOVER_TOKENS;
    if token_count > threshold || carried_over {
        if let Some(selection) = resolve_slot(RouteKind::LongContext) {
            debug!(token_count, threshold, carried_over, "Long-context route matched");
            return selection;
        }
    }

    if let Some(model) = take_subagent_model(request) {
        debug!(model = %model, "Sub-agent marker matched");
        return Ok(Selection::new(model, RouteKind::SubAgent));
    }

    if request.model.starts_with(BACKGROUND_MODEL_PREFIX) {
        if let Some(selection) = resolve_slot(RouteKind::Background) {
            return selection;
        }
    }

    if request.thinking_requested() {
        if let Some(selection) = resolve_slot(RouteKind::Think) {
            return selection;
        }
    }

    if request.has_tool_type_prefix(WEB_SEARCH_TOOL_PREFIX) {
        if let Some(selection) = resolve_slot(RouteKind::WebSearch) {
            return selection;
        }
    }

    resolve_slot(RouteKind::Default).unwrap_or_else(|| {
        Err(RouterError::Configuration(
            "no default route configured (router.default)".to_string(),
        ))
    })
}

/// Canonicalize `provider,model` against the configured providers.
///
/// Both halves are matched case-insensitively and the configured spelling is
/// returned. Anything that does not resolve is passed through unchanged.
fn explicit_override(requested: &str, config: &RouterConfig) -> String {
    let Some((provider_name, model_name)) = requested.split_once(',') else {
        return requested.to_string();
    };
    config
        .find_provider(provider_name)
        .and_then(|provider| {
            provider
                .find_model(model_name)
                .map(|model| format!("{},{}", provider.name, model))
        })
        .unwrap_or_else(|| requested.to_string())
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
