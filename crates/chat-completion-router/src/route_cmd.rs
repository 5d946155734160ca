use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ccr_config::RouterConfig;
use ccr_core::{ChatRequest, OutputFormat};
use ccr_router::{
    CharEstimateCounter, ModelRouter, RouteDecision, TiktokenCounter, TokenCounter,
    count_request_tokens, upstream_body,
};
use serde_json::json;
use tracing::debug;

use crate::cli::Tokenizer;

/// Read a request from `path`, or stdin when `path` is absent or `-`.
pub(crate) fn read_request(path: Option<&Path>) -> Result<ChatRequest> {
    let (content, source) = match path.filter(|p| p.as_os_str() != "-") {
        Some(path) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read request: {}", path.display()))?,
            path.display().to_string(),
        ),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            (buf, "<stdin>".to_string())
        }
    };
    serde_json::from_str(&content).with_context(|| format!("Invalid request JSON: {source}"))
}

pub(crate) fn token_counter(tokenizer: Tokenizer) -> Arc<dyn TokenCounter> {
    match tokenizer {
        Tokenizer::Tiktoken => {
            TiktokenCounter::preload();
            Arc::new(TiktokenCounter)
        }
        Tokenizer::Estimate => Arc::new(CharEstimateCounter),
    }
}

/// Handle `ccr route`.
pub(crate) async fn handle_route(
    config_path: Option<&Path>,
    request_path: Option<&Path>,
    emit_body: bool,
    tokenizer: Tokenizer,
    format: OutputFormat,
) -> Result<()> {
    let (path, config) = RouterConfig::load_or_default_path(config_path)?;
    debug!(config = %path.display(), "Loaded configuration");
    let mut request = read_request(request_path)?;
    let router = ModelRouter::new(config)?.with_token_counter(token_counter(tokenizer));

    let decision = router.route(&mut request).await;
    let body = if emit_body {
        Some(upstream_body(&request, router.config()).context("Failed to build upstream body")?)
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let mut out = json!({ "decision": decision });
            if let Some(body) = body {
                out["body"] = body;
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            print!("{}", format_decision(&decision));
            if let Some(body) = body {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }
    }
    Ok(())
}

/// Handle `ccr tokens`.
pub(crate) fn handle_tokens(
    request_path: Option<&Path>,
    tokenizer: Tokenizer,
    format: OutputFormat,
) -> Result<()> {
    let request = read_request(request_path)?;
    let tokens = count_request_tokens(&request, token_counter(tokenizer).as_ref());
    match format {
        OutputFormat::Json => println!("{}", json!({ "tokens": tokens })),
        OutputFormat::Text => println!("{tokens}"),
    }
    Ok(())
}

pub(crate) fn format_decision(decision: &RouteDecision) -> String {
    format!(
        "model:  {}\nroute:  {}\nscope:  {}\ntokens: {}\n",
        decision.model, decision.route, decision.scope, decision.token_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccr_core::RouteKind;
    use ccr_scheduler::RoutingScope;

    #[test]
    fn test_read_request_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        std::fs::write(&path, r#"{"model": "m", "stream": true}"#).unwrap();

        let req = read_request(Some(&path)).unwrap();
        assert_eq!(req.model, "m");
        assert_eq!(req.extra["stream"], true);
    }

    #[test]
    fn test_read_request_reports_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = read_request(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn test_format_decision() {
        let decision = RouteDecision {
            model: "deepseek,deepseek-chat".to_string(),
            route: RouteKind::Default,
            scope: RoutingScope::session("abc"),
            token_count: 42,
        };
        let text = format_decision(&decision);
        assert!(text.contains("model:  deepseek,deepseek-chat"));
        assert!(text.contains("route:  default"));
        assert!(text.contains("scope:  session:abc"));
        assert!(text.contains("tokens: 42"));
    }

    #[test]
    fn test_tiktoken_counter_selected() {
        let counter = token_counter(Tokenizer::Tiktoken);
        assert_eq!(counter.count("hello world"), 2);
    }

    #[test]
    fn test_estimate_counter_selected() {
        let counter = token_counter(Tokenizer::Estimate);
        assert_eq!(counter.count("abcdefgh"), 2);
    }
}
