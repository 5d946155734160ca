//! `ccr replay`: drive one in-process router through a scripted sequence of
//! selections, routed requests, and upstream outcomes.
//!
//! Each non-empty line of the script is a JSON object tagged by `op`:
//!
//! ```text
//! {"op": "select", "candidates": ["a", "b"], "session": "s1"}
//! {"op": "route", "request": {"model": "claude-sonnet-4", "messages": []}}
//! {"op": "failure", "provider": "a", "session": "s1", "error": {"status": 503}, "at": "2025-01-01T00:00:00Z"}
//! {"op": "success", "provider": "a", "session": "s1"}
//! {"op": "usage", "session": "s1", "usage": {"input_tokens": 70000}}
//! {"op": "reset", "session": "s1"}
//! ```
//!
//! Lines starting with `#` are comments. `at` pins the clock for `select` and
//! `failure` so cooldown behavior can be replayed deterministically.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use ccr_config::{FailureTracking, RouterConfig};
use ccr_core::{ChatRequest, OutputFormat};
use ccr_router::{ModelRouter, RouteDecision, TiktokenCounter, Usage};
use ccr_scheduler::{ErrorInfo, RoutingScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::route_cmd::format_decision;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum ReplayOp {
    Select {
        candidates: Vec<String>,
        #[serde(default)]
        session: Option<String>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Route {
        request: Box<ChatRequest>,
    },
    Failure {
        provider: String,
        #[serde(default)]
        session: Option<String>,
        /// Opaque upstream error; absent means "no error object".
        #[serde(default)]
        error: Option<Value>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Success {
        provider: String,
        #[serde(default)]
        session: Option<String>,
    },
    Usage {
        session: String,
        usage: Usage,
    },
    Reset {
        #[serde(default)]
        session: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum ReplayOutcome {
    Select {
        scope: RoutingScope,
        provider: String,
    },
    Route {
        decision: RouteDecision,
    },
    Failure {
        scope: RoutingScope,
        provider: String,
        recorded: bool,
        streak: u32,
    },
    Success {
        scope: RoutingScope,
        provider: String,
        cleared: bool,
    },
    Usage {
        session: String,
    },
    Reset {
        scope: RoutingScope,
        removed: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ReplayStep {
    pub line: usize,
    #[serde(flatten)]
    pub outcome: ReplayOutcome,
}

/// Handle `ccr replay`.
pub(crate) async fn handle_replay(
    config_path: Option<&Path>,
    script_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let (_, config) = RouterConfig::load_or_default_path(config_path)?;
    let script = read_script(script_path)?;
    TiktokenCounter::preload();
    let router = ModelRouter::new(config)?;

    for step in run_script(&router, &script).await? {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&step)?),
            OutputFormat::Text => print!("{}", format_step(&step)),
        }
    }
    Ok(())
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read replay script from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read replay script: {}", path.display()))
}

/// Parse and execute every operation in `script`, stopping at the first bad line.
pub(crate) async fn run_script(router: &ModelRouter, script: &str) -> Result<Vec<ReplayStep>> {
    let mut steps = Vec::new();
    for (index, raw) in script.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let op: ReplayOp = serde_json::from_str(trimmed)
            .with_context(|| format!("line {line}: invalid replay operation"))?;
        let outcome = apply(router, op)
            .await
            .with_context(|| format!("line {line}: operation failed"))?;
        steps.push(ReplayStep { line, outcome });
    }
    Ok(steps)
}

async fn apply(router: &ModelRouter, op: ReplayOp) -> Result<ReplayOutcome> {
    let failover = router.failover();
    let outcome = match op {
        ReplayOp::Select {
            candidates,
            session,
            at,
        } => {
            let scope = RoutingScope::from_session(session.as_deref());
            let provider =
                failover.select_provider_at(&candidates, &scope, at.unwrap_or_else(Utc::now))?;
            ReplayOutcome::Select { scope, provider }
        }
        ReplayOp::Route { mut request } => ReplayOutcome::Route {
            decision: router.route(&mut request).await,
        },
        ReplayOp::Failure {
            provider,
            session,
            error,
            at,
        } => {
            let scope = RoutingScope::from_session(session.as_deref());
            let error = error.as_ref().map(ErrorInfo::from_json);
            let recorded = failover.record_failure_at(
                &provider,
                &scope,
                error.as_ref(),
                at.unwrap_or_else(Utc::now),
            );
            let streak = failover.snapshot(&scope).map_or(0, |record| {
                match failover.policy().tracking {
                    FailureTracking::Scope => record.failure_streak(),
                    FailureTracking::Candidate => record.candidate_streak(&provider),
                }
            });
            ReplayOutcome::Failure {
                scope,
                provider,
                recorded,
                streak,
            }
        }
        ReplayOp::Success { provider, session } => {
            let scope = RoutingScope::from_session(session.as_deref());
            let cleared = failover.record_success(&provider, &scope);
            ReplayOutcome::Success {
                scope,
                provider,
                cleared,
            }
        }
        ReplayOp::Usage { session, usage } => {
            router.record_usage(&session, usage);
            ReplayOutcome::Usage { session }
        }
        ReplayOp::Reset { session } => {
            let scope = RoutingScope::from_session(session.as_deref());
            let removed = failover.reset(&scope);
            ReplayOutcome::Reset { scope, removed }
        }
    };
    Ok(outcome)
}

fn format_step(step: &ReplayStep) -> String {
    let line = step.line;
    match &step.outcome {
        ReplayOutcome::Select { scope, provider } => {
            format!("{line}: select [{scope}] -> {provider}\n")
        }
        ReplayOutcome::Route { decision } => {
            let indented: String = format_decision(decision)
                .lines()
                .map(|l| format!("  {l}\n"))
                .collect();
            format!("{line}: route\n{indented}")
        }
        ReplayOutcome::Failure {
            scope,
            provider,
            recorded,
            streak,
        } => {
            let status = if *recorded { "recorded" } else { "ignored" };
            format!("{line}: failure [{scope}] {provider} {status} (streak {streak})\n")
        }
        ReplayOutcome::Success {
            scope,
            provider,
            cleared,
        } => {
            let status = if *cleared { "cleared" } else { "no record" };
            format!("{line}: success [{scope}] {provider} {status}\n")
        }
        ReplayOutcome::Usage { session } => format!("{line}: usage [session:{session}]\n"),
        ReplayOutcome::Reset { scope, removed } => {
            let status = if *removed { "removed" } else { "no record" };
            format!("{line}: reset [{scope}] {status}\n")
        }
    }
}

#[cfg(test)]
#[path = "replay_cmd_tests.rs"]
mod tests;
