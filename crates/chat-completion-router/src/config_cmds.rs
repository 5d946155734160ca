use std::path::Path;

use anyhow::{Context, Result};
use ccr_config::{RouterConfig, validate_loaded_config};
use ccr_core::OutputFormat;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

const REDACTED: &str = "<redacted>";

/// Handle `ccr config check`.
pub(crate) fn handle_config_check(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let (path, config) = RouterConfig::load_or_default_path(config_path)?;
    validate_loaded_config(&config)
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", json!({ "path": path.display().to_string(), "valid": true }));
        }
        OutputFormat::Text => {
            println!("Configuration OK: {}", path.display());
            println!(
                "  {} provider(s), {} route slot(s), {} prompt rule(s)",
                config.providers.len(),
                config.router.slots().len(),
                config.router.prompt_rules.len()
            );
        }
    }
    Ok(())
}

/// Handle `ccr config show`.
pub(crate) fn handle_config_show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let (_, config) = RouterConfig::load_or_default_path(config_path)?;
    let config = redacted(config);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Text => print!("{}", render_text(&config)?),
    }
    Ok(())
}

/// TOML when the config has a TOML form, JSON otherwise (TOML has no `null`).
fn render_text(config: &RouterConfig) -> Result<String> {
    match toml::to_string_pretty(config) {
        Ok(text) => Ok(text),
        Err(err) => {
            warn!(error = %err, "Configuration has no TOML form; showing JSON");
            let json =
                serde_json::to_string_pretty(config).context("Failed to render config as JSON")?;
            Ok(format!("{json}\n"))
        }
    }
}

/// Provider listing entry; never carries the API key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderSummary<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_base_url: Option<&'a str>,
    has_api_key: bool,
    models: &'a [String],
}

/// Handle `ccr providers`.
pub(crate) fn handle_providers(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let (_, config) = RouterConfig::load_or_default_path(config_path)?;
    let summaries = provider_summaries(&config);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            if summaries.is_empty() {
                eprintln!("No providers configured.");
                return Ok(());
            }
            print!("{}", format_providers(&summaries));
        }
    }
    Ok(())
}

fn provider_summaries(config: &RouterConfig) -> Vec<ProviderSummary<'_>> {
    config
        .providers
        .iter()
        .map(|p| ProviderSummary {
            name: &p.name,
            api_base_url: p.api_base_url.as_deref(),
            has_api_key: p.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            models: &p.models,
        })
        .collect()
}

fn format_providers(summaries: &[ProviderSummary<'_>]) -> String {
    let mut out = String::new();
    for summary in summaries {
        let url = summary.api_base_url.unwrap_or("-");
        out.push_str(&format!("{} ({})\n", summary.name, url));
        if summary.models.is_empty() {
            out.push_str("  (any model)\n");
        }
        for (i, model) in summary.models.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, model));
        }
    }
    out
}

fn redacted(mut config: RouterConfig) -> RouterConfig {
    for provider in &mut config.providers {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.to_string());
        }
    }
    config
}
