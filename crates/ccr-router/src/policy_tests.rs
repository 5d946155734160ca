use super::*;
use serde_json::{Value, json};

const CONFIG: &str = r#"
[[providers]]
name = "openrouter"
models = ["anthropic/claude-3.5-sonnet", "google/gemini-2.5-pro"]

[[providers]]
name = "deepseek"
models = ["deepseek-chat", "deepseek-reasoner"]

[router]
default = "deepseek,deepseek-chat"
longContext = "bigmodel"
background = "deepseek,deepseek-chat-lite"
think = ["deepseek,deepseek-reasoner", "openrouter,anthropic/claude-3.5-sonnet"]
webSearch = "openrouter,google/gemini-2.5-pro"
"#;

fn config() -> RouterConfig {
    RouterConfig::from_toml_str(CONFIG).expect("parse config")
}

fn request_from(value: Value) -> ChatRequest {
    serde_json::from_value(value).expect("valid request")
}

fn select(request: &mut ChatRequest, tokens: u64, usage: Option<&Usage>) -> Result<Selection> {
    let manager = FailoverManager::default();
    select_model(
        request,
        tokens,
        &config(),
        usage,
        &manager,
        &RoutingScope::global(),
    )
}

#[test]
fn test_explicit_override_canonicalizes() {
    let mut req = ChatRequest::new("OpenRouter,Anthropic/Claude-3.5-Sonnet");
    let selection = select(&mut req, 100_000, None).unwrap();
    assert_eq!(
        selection,
        Selection::new("openrouter,anthropic/claude-3.5-sonnet", RouteKind::Explicit)
    );
}

#[test]
fn test_explicit_override_unknown_passes_through() {
    for requested in ["nobody,model", "openrouter,unknown-model", "deepseek,"] {
        let mut req = ChatRequest::new(requested);
        let selection = select(&mut req, 0, None).unwrap();
        assert_eq!(selection, Selection::new(requested, RouteKind::Explicit));
    }
}

#[test]
fn test_explicit_override_wins_over_subagent_marker() {
    let mut req = request_from(json!({
        "model": "deepseek,deepseek-chat",
        "system": [
            {"type": "text", "text": "a"},
            {"type": "text", "text": "<CCR-SUBAGENT-MODEL>foo</CCR-SUBAGENT-MODEL>"}
        ]
    }));
    let selection = select(&mut req, 0, None).unwrap();
    assert_eq!(selection.route, RouteKind::Explicit);
    // Marker untouched because the chain short-circuited.
    assert!(serde_json::to_string(&req).unwrap().contains("CCR-SUBAGENT-MODEL"));
}

#[test]
fn test_long_context_by_token_count() {
    let mut req = ChatRequest::new("claude-sonnet-4");
    let selection = select(&mut req, 70_000, None).unwrap();
    assert_eq!(selection, Selection::new("bigmodel", RouteKind::LongContext));

    let selection = select(&mut req, 60_000, None).unwrap();
    assert_eq!(selection.route, RouteKind::Default);
}

#[test]
fn test_long_context_carried_over_from_last_usage() {
    let big = Usage {
        input_tokens: 65_000,
        ..Usage::default()
    };
    let mut req = ChatRequest::new("claude-sonnet-4");

    let selection = select(&mut req, 20_001, Some(&big)).unwrap();
    assert_eq!(selection.route, RouteKind::LongContext);

    let selection = select(&mut req, 20_000, Some(&big)).unwrap();
    assert_eq!(selection.route, RouteKind::Default);

    let small = Usage {
        input_tokens: 1_000,
        ..Usage::default()
    };
    let selection = select(&mut req, 50_000, Some(&small)).unwrap();
    assert_eq!(selection.route, RouteKind::Default);
}

#[test]
fn test_custom_long_context_threshold() {
    let mut config = config();
    config.router.long_context_threshold = 1_000;
    let manager = FailoverManager::default();
    let mut req = ChatRequest::new("claude-sonnet-4");

    let selection = select_model(
        &mut req,
        1_001,
        &config,
        None,
        &manager,
        &RoutingScope::global(),
    )
    .unwrap();
    assert_eq!(selection.route, RouteKind::LongContext);
}

#[test]
fn test_long_context_skipped_when_unset() {
    let mut config = config();
    config.router.long_context = None;
    let manager = FailoverManager::default();
    let mut req = ChatRequest::new("claude-sonnet-4");

    let selection = select_model(
        &mut req,
        500_000,
        &config,
        None,
        &manager,
        &RoutingScope::global(),
    )
    .unwrap();
    assert_eq!(selection.route, RouteKind::Default);
}

#[test]
fn test_subagent_marker_selects_literal_model() {
    let mut req = request_from(json!({
        "model": "claude-sonnet-4",
        "system": [
            {"type": "text", "text": "base"},
            {"type": "text", "text": "<CCR-SUBAGENT-MODEL>foo</CCR-SUBAGENT-MODEL>"}
        ]
    }));
    let selection = select(&mut req, 10, None).unwrap();
    assert_eq!(selection, Selection::new("foo", RouteKind::SubAgent));
    assert!(!serde_json::to_string(&req).unwrap().contains("CCR-SUBAGENT-MODEL"));
}

#[test]
fn test_long_context_beats_subagent_marker() {
    let mut req = request_from(json!({
        "model": "claude-sonnet-4",
        "system": [
            {"type": "text", "text": "base"},
            {"type": "text", "text": "<CCR-SUBAGENT-MODEL>foo</CCR-SUBAGENT-MODEL>"}
        ]
    }));
    let selection = select(&mut req, 90_000, None).unwrap();
    assert_eq!(selection.route, RouteKind::LongContext);
}

#[test]
fn test_background_model_prefix() {
    let mut req = ChatRequest::new("claude-3-5-haiku-20241022");
    let selection = select(&mut req, 10, None).unwrap();
    assert_eq!(
        selection,
        Selection::new("deepseek,deepseek-chat-lite", RouteKind::Background)
    );
}

#[test]
fn test_thinking_resolves_candidate_list() {
    let mut req = request_from(json!({
        "model": "claude-sonnet-4",
        "thinking": {"type": "enabled", "budget_tokens": 4096}
    }));
    let manager = FailoverManager::default();
    let scope = RoutingScope::session("s1");
    let config = config();

    let first = select_model(&mut req, 10, &config, None, &manager, &scope).unwrap();
    let second = select_model(&mut req, 10, &config, None, &manager, &scope).unwrap();
    assert_eq!(first, Selection::new("deepseek,deepseek-reasoner", RouteKind::Think));
    assert_eq!(
        second,
        Selection::new("openrouter,anthropic/claude-3.5-sonnet", RouteKind::Think)
    );
}

#[test]
fn test_thinking_beats_web_search() {
    let mut req = request_from(json!({
        "model": "claude-sonnet-4",
        "thinking": {"type": "enabled"},
        "tools": [{"type": "web_search_20250305", "name": "web_search"}]
    }));
    assert_eq!(select(&mut req, 10, None).unwrap().route, RouteKind::Think);
}

#[test]
fn test_web_search_tool() {
    let mut req = request_from(json!({
        "model": "claude-sonnet-4",
        "tools": [{"type": "web_search_20250305", "name": "web_search"}]
    }));
    assert_eq!(
        select(&mut req, 10, None).unwrap(),
        Selection::new("openrouter,google/gemini-2.5-pro", RouteKind::WebSearch)
    );
}

#[test]
fn test_unset_slots_fall_through_to_default() {
    let mut config = config();
    config.router.background = None;
    config.router.think = Some(RouterTarget::Single(String::new()));
    let manager = FailoverManager::default();
    let mut req = request_from(json!({
        "model": "claude-3-5-haiku-latest",
        "thinking": {"type": "enabled"}
    }));

    let selection = select_model(
        &mut req,
        10,
        &config,
        None,
        &manager,
        &RoutingScope::global(),
    )
    .unwrap();
    assert_eq!(selection, Selection::new("deepseek,deepseek-chat", RouteKind::Default));
}

#[test]
fn test_missing_default_is_configuration_error() {
    let config = RouterConfig::default();
    let manager = FailoverManager::default();
    let mut req = ChatRequest::new("claude-sonnet-4");

    let err = select_model(
        &mut req,
        10,
        &config,
        None,
        &manager,
        &RoutingScope::global(),
    )
    .unwrap_err();
    assert!(matches!(err, RouterError::Configuration(_)));
}

#[test]
fn test_empty_candidate_list_is_invalid_input() {
    let mut config = config();
    config.router.default = Some(RouterTarget::Candidates(vec![]));
    let manager = FailoverManager::default();
    let mut req = ChatRequest::new("claude-sonnet-4");

    let err = select_model(
        &mut req,
        10,
        &config,
        None,
        &manager,
        &RoutingScope::global(),
    )
    .unwrap_err();
    assert!(matches!(err, RouterError::InvalidInput(_)));
}

#[test]
fn test_resolve_single_bypasses_failover() {
    let manager = FailoverManager::default();
    let scope = RoutingScope::global();
    let picked = resolve(&RouterTarget::from("bigmodel"), &manager, &scope).unwrap();
    assert_eq!(picked, "bigmodel");
    assert!(manager.scopes().is_empty());
}
