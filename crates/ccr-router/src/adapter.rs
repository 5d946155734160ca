//! Turning a routing decision into the request an upstream provider receives.

use ccr_config::{ProviderConfig, RouterConfig};
use ccr_core::ChatRequest;
use serde::Serialize;
use serde_json::Value;

/// A selected identifier resolved against the provider table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamTarget {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

/// Split `provider,model` at the first comma.
pub fn split_provider_model(selected: &str) -> Option<(&str, &str)> {
    selected
        .split_once(',')
        .filter(|(provider, model)| !provider.is_empty() && !model.is_empty())
}

/// Resolve a selected identifier to a configured provider.
///
/// Bare model names and unknown providers yield `None`; the identifier is then
/// forwarded verbatim.
pub fn resolve_upstream(selected: &str, config: &RouterConfig) -> Option<UpstreamTarget> {
    let (provider_name, model) = split_provider_model(selected)?;
    let provider = config.find_provider(provider_name)?;
    Some(UpstreamTarget {
        provider: provider.name.clone(),
        model: provider.find_model(model).unwrap_or(model).to_string(),
        api_base_url: provider.api_base_url.clone(),
    })
}

/// Apply a provider's body rules: listed keys are removed, then forced keys set.
pub fn apply_provider_body_rules(body: &mut Value, provider: &ProviderConfig) {
    let Value::Object(map) = body else {
        return;
    };
    for key in &provider.delete_body_keys {
        map.remove(key);
    }
    for (key, value) in &provider.set_body_keys {
        map.insert(key.clone(), value.clone());
    }
}

/// Serialize `request` for its selected provider.
///
/// When the request's model resolves to a configured provider, the body
/// carries the bare model name and that provider's body rules. Otherwise the
/// request is serialized as-is.
pub fn upstream_body(request: &ChatRequest, config: &RouterConfig) -> serde_json::Result<Value> {
    let mut body = serde_json::to_value(request)?;
    let Some(target) = resolve_upstream(&request.model, config) else {
        return Ok(body);
    };
    if let Value::Object(map) = &mut body {
        map.insert("model".to_string(), Value::String(target.model.clone()));
    }
    if let Some(provider) = config.find_provider(&target.provider) {
        apply_provider_body_rules(&mut body, provider);
    }
    Ok(body)
}
