use anyhow::{Result, bail};
use ccr_core::{RouteKind, RouterTarget};
use std::path::Path;
use tracing::warn;

use crate::config::RouterConfig;

/// Validate the config file at `path`.
/// Returns Ok(()) if valid, or Err with a message naming the offending key.
pub fn validate_config(path: &Path) -> Result<()> {
    let config = RouterConfig::load(path)?;
    validate_loaded_config(&config)
}

pub fn validate_loaded_config(config: &RouterConfig) -> Result<()> {
    validate_providers(config)?;
    validate_routes(config)?;
    validate_failover(config)?;
    validate_prompt_rules(config)?;
    Ok(())
}

fn validate_providers(config: &RouterConfig) -> Result<()> {
    let mut seen: Vec<String> = Vec::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            bail!("providers: provider name cannot be empty");
        }
        if provider.name.contains(',') {
            bail!(
                "providers: provider name '{}' cannot contain ','",
                provider.name
            );
        }
        let lowered = provider.name.to_lowercase();
        if seen.contains(&lowered) {
            bail!(
                "providers: duplicate provider name '{}' (names are case-insensitive)",
                provider.name
            );
        }
        seen.push(lowered);
    }
    Ok(())
}

fn validate_routes(config: &RouterConfig) -> Result<()> {
    let router = &config.router;
    if router.target(RouteKind::Default).is_none() {
        bail!("router.default is required");
    }
    if router.long_context_threshold == 0 {
        bail!("router.longContextThreshold must be > 0 (got 0)");
    }
    for (slot, target) in router.slots() {
        validate_target(config, &format!("router.{slot}"), target)?;
    }
    Ok(())
}

fn validate_target(config: &RouterConfig, key: &str, target: &RouterTarget) -> Result<()> {
    if let RouterTarget::Candidates(list) = target {
        if list.is_empty() {
            bail!("{key} must list at least one candidate");
        }
    }
    for identifier in target.identifiers() {
        let Some((provider_name, model)) = identifier.split_once(',') else {
            // Bare model names are passed through untouched.
            continue;
        };
        let Some(provider) = config.find_provider(provider_name) else {
            bail!(
                "{key} references unknown provider '{}'. Available providers: {:?}",
                provider_name,
                config
                    .providers
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
            );
        };
        if !provider.models.is_empty() && provider.find_model(model).is_none() {
            bail!(
                "{key} references model '{}' which provider '{}' does not declare",
                model,
                provider.name
            );
        }
    }
    Ok(())
}

fn validate_failover(config: &RouterConfig) -> Result<()> {
    let failover = &config.router.failover;
    if failover.max_failures == 0 {
        bail!("router.failover.maxFailures must be > 0 (got 0)");
    }
    if failover.cooldown_secs == 0 {
        warn!("router.failover.cooldownSecs is 0: saturated candidates rejoin rotation immediately");
    }
    Ok(())
}

fn validate_prompt_rules(config: &RouterConfig) -> Result<()> {
    for (index, rule) in config.router.prompt_rules.iter().enumerate() {
        if let Err(e) = regex::Regex::new(&rule.pattern) {
            bail!(
                "router.promptRules[{}]: invalid pattern '{}': {}",
                index,
                rule.pattern,
                e
            );
        }
        validate_target(config, &format!("router.promptRules[{index}]"), &rule.target)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
