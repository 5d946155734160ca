use anyhow::{Context, Result, bail};
use ccr_core::{RouteKind, RouterTarget};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Token count above which the long-context route applies.
pub const DEFAULT_LONG_CONTEXT_THRESHOLD: u64 = 60_000;

/// Application name used for the default config directory.
pub const APP_NAME: &str = "ccr";

const ROUTER_KEYS: &[&str] = &[
    "default",
    "longContext",
    "long_context",
    "background",
    "think",
    "webSearch",
    "web_search",
    "longContextThreshold",
    "long_context_threshold",
    "failover",
    "promptRules",
    "prompt_rules",
];

/// How failure streaks are tracked inside a routing scope.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureTracking {
    /// One streak for the whole scope; any failing candidate stales them all.
    #[default]
    Scope,
    /// A streak per candidate; only the failing candidate cools down.
    Candidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverSettings {
    #[serde(default = "default_cooldown_secs", alias = "cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_failures", alias = "max_failures")]
    pub max_failures: u32,
    #[serde(default)]
    pub tracking: FailureTracking,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            max_failures: default_max_failures(),
            tracking: FailureTracking::default(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_max_failures() -> u32 {
    3
}

/// Regex rule consulted by the prompt-rule router before the built-in chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRule {
    pub pattern: String,
    pub target: RouterTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "api_base_url")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "api_key")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    /// Top-level body keys removed before forwarding to this provider.
    #[serde(default, skip_serializing_if = "Vec::is_empty", alias = "delete_body_keys")]
    pub delete_body_keys: Vec<String>,
    /// Top-level body keys forced to a value before forwarding to this provider.
    #[serde(default, skip_serializing_if = "Map::is_empty", alias = "set_body_keys")]
    pub set_body_keys: Map<String, Value>,
}

impl ProviderConfig {
    /// Case-insensitive lookup of a declared model; returns the configured spelling.
    pub fn find_model(&self, model: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|m| m.eq_ignore_ascii_case(model))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<RouterTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "long_context")]
    pub long_context: Option<RouterTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<RouterTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think: Option<RouterTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "web_search")]
    pub web_search: Option<RouterTarget>,
    #[serde(
        default = "default_long_context_threshold",
        alias = "long_context_threshold"
    )]
    pub long_context_threshold: u64,
    #[serde(default)]
    pub failover: FailoverSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty", alias = "prompt_rules")]
    pub prompt_rules: Vec<PromptRule>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            default: None,
            long_context: None,
            background: None,
            think: None,
            web_search: None,
            long_context_threshold: DEFAULT_LONG_CONTEXT_THRESHOLD,
            failover: FailoverSettings::default(),
            prompt_rules: Vec::new(),
        }
    }
}

fn default_long_context_threshold() -> u64 {
    DEFAULT_LONG_CONTEXT_THRESHOLD
}

impl RouterSection {
    /// Configured target for a route slot.
    ///
    /// An empty string counts as "not configured", matching config files that
    /// leave unused slots as `""`. Empty lists are returned as-is so that
    /// resolving them surfaces an error instead of silently skipping the rule.
    pub fn target(&self, kind: RouteKind) -> Option<&RouterTarget> {
        let slot = match kind {
            RouteKind::Default | RouteKind::Fallback => &self.default,
            RouteKind::LongContext => &self.long_context,
            RouteKind::Background => &self.background,
            RouteKind::Think => &self.think,
            RouteKind::WebSearch => &self.web_search,
            RouteKind::Custom | RouteKind::Explicit | RouteKind::SubAgent => return None,
        };
        slot.as_ref().filter(|target| match target {
            RouterTarget::Single(value) => !value.trim().is_empty(),
            RouterTarget::Candidates(_) => true,
        })
    }

    /// Every configured slot with its name, for display and validation.
    pub fn slots(&self) -> Vec<(&'static str, &RouterTarget)> {
        [
            ("default", RouteKind::Default),
            ("longContext", RouteKind::LongContext),
            ("background", RouteKind::Background),
            ("think", RouteKind::Think),
            ("webSearch", RouteKind::WebSearch),
        ]
        .into_iter()
        .filter_map(|(name, kind)| self.target(kind).map(|t| (name, t)))
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default, alias = "Providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default, alias = "Router")]
    pub router: RouterSection,
}

impl RouterConfig {
    /// Load config from `path`; `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let raw: Value = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        };
        Self::from_value(raw, &path.display().to_string())
    }

    /// Load from an explicit path, or the first default location that exists.
    pub fn load_or_default_path(path: Option<&Path>) -> Result<(PathBuf, Self)> {
        if let Some(path) = path {
            return Ok((path.to_path_buf(), Self::load(path)?));
        }
        let candidates = Self::default_config_paths();
        match candidates.iter().find(|p| p.exists()) {
            Some(found) => Ok((found.clone(), Self::load(found)?)),
            None => bail!(
                "No configuration found. Looked in: {}. Pass --config <path>.",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: Value = toml::from_str(content).context("Failed to parse TOML config")?;
        Self::from_value(raw, "<toml>")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(content).context("Failed to parse JSON config")?;
        Self::from_value(raw, "<json>")
    }

    fn from_value(raw: Value, source: &str) -> Result<Self> {
        warn_unknown_router_keys(&raw, source);
        serde_json::from_value(raw).with_context(|| format!("Invalid config structure: {source}"))
    }

    /// `config.toml` then `config.json` under the user config directory.
    pub fn default_config_paths() -> Vec<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| {
                let dir = dirs.config_dir();
                vec![dir.join("config.toml"), dir.join("config.json")]
            })
            .unwrap_or_default()
    }

    /// Case-insensitive provider lookup by name.
    pub fn find_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Serde drops unknown keys silently; a misspelled route slot would route
/// everything to the default without any hint, so call them out.
fn warn_unknown_router_keys(raw: &Value, source: &str) {
    let router = raw.get("router").or_else(|| raw.get("Router"));
    if let Some(Value::Object(section)) = router {
        for key in section.keys() {
            if !ROUTER_KEYS.contains(&key.as_str()) {
                warn!(config = %source, key = %key, "Unrecognized router key is ignored");
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
