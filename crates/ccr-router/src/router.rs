//! Top-level routing entry point.
//!
//! [`ModelRouter::route`] never fails: a custom router error or a policy error
//! is logged and routing degrades to the default route, then to the default
//! route's first identifier, then to the model the client asked for.

use std::sync::Arc;

use anyhow::Result;
use ccr_config::RouterConfig;
use ccr_core::{ChatRequest, RouteKind};
use ccr_scheduler::{ErrorInfo, FailoverManager, FailoverPolicy, RoutingScope};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::custom::{CustomRouter, PromptRuleRouter};
use crate::policy::{Selection, resolve, select_model};
use crate::tokens::{TiktokenCounter, TokenCounter, count_request_tokens};
use crate::usage::{Usage, UsageCache};

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub model: String,
    pub route: RouteKind,
    pub scope: RoutingScope,
    pub token_count: u64,
}

/// Routes requests against one configuration, sharing failover and usage
/// state across calls.
#[derive(Clone)]
pub struct ModelRouter {
    config: Arc<RouterConfig>,
    failover: Arc<FailoverManager>,
    usage: Arc<UsageCache>,
    counter: Arc<dyn TokenCounter>,
    custom: Option<Arc<dyn CustomRouter>>,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("config", &self.config)
            .field("failover", &self.failover)
            .field("usage", &self.usage)
            .field("custom", &self.custom.is_some())
            .finish_non_exhaustive()
    }
}

impl ModelRouter {
    /// Build a router from `config`.
    ///
    /// The failover policy comes from `router.failover`, and configured
    /// `router.promptRules` are installed as the custom router. Fails only
    /// when a prompt rule does not compile.
    pub fn new(config: RouterConfig) -> Result<Self> {
        let policy = FailoverPolicy::from(&config.router.failover);
        let custom: Option<Arc<dyn CustomRouter>> = if config.router.prompt_rules.is_empty() {
            None
        } else {
            Some(Arc::new(PromptRuleRouter::from_rules(
                &config.router.prompt_rules,
            )?))
        };
        Ok(Self {
            config: Arc::new(config),
            failover: Arc::new(FailoverManager::new(policy)),
            usage: Arc::new(UsageCache::default()),
            counter: Arc::new(TiktokenCounter),
            custom,
        })
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Replace any custom router, including one built from prompt rules.
    pub fn with_custom_router(mut self, custom: Arc<dyn CustomRouter>) -> Self {
        self.custom = Some(custom);
        self
    }

    /// Share failover state with another router or an outcome reporter.
    pub fn with_failover(mut self, failover: Arc<FailoverManager>) -> Self {
        self.failover = failover;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn failover(&self) -> &Arc<FailoverManager> {
        &self.failover
    }

    pub fn usage(&self) -> &Arc<UsageCache> {
        &self.usage
    }

    pub fn count_tokens(&self, request: &ChatRequest) -> u64 {
        count_request_tokens(request, self.counter.as_ref())
    }

    /// Pick a model for `request` and write it back into `request.model`.
    pub async fn route(&self, request: &mut ChatRequest) -> RouteDecision {
        let session_id = request.session_id().map(str::to_owned);
        let scope = RoutingScope::from_session(session_id.as_deref());
        let token_count = self.count_tokens(request);
        let last_usage = session_id.as_deref().and_then(|id| self.usage.get(id));

        let custom = self.custom_selection(request, token_count, &scope).await;
        let selection = match custom {
            Some(selection) => selection,
            None => self.policy_selection(request, token_count, last_usage.as_ref(), &scope),
        };

        debug!(
            requested = %request.model,
            model = %selection.model,
            route = %selection.route,
            scope = %scope,
            token_count,
            "Routed request"
        );
        request.model = selection.model.clone();
        RouteDecision {
            model: selection.model,
            route: selection.route,
            scope,
            token_count,
        }
    }

    async fn custom_selection(
        &self,
        request: &ChatRequest,
        token_count: u64,
        scope: &RoutingScope,
    ) -> Option<Selection> {
        let custom = self.custom.as_ref()?;
        let target = match custom.route(request, &self.config, token_count).await {
            Ok(Some(target)) => target,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Custom router failed; using built-in routing");
                return None;
            }
        };
        match resolve(&target, &self.failover, scope) {
            Ok(model) => {
                info!(model = %model, target = %target, "Custom router selected model");
                Some(Selection::new(model, RouteKind::Custom))
            }
            Err(e) => {
                warn!(error = %e, target = %target, "Custom route unusable; using built-in routing");
                None
            }
        }
    }

    fn policy_selection(
        &self,
        request: &mut ChatRequest,
        token_count: u64,
        last_usage: Option<&Usage>,
        scope: &RoutingScope,
    ) -> Selection {
        match select_model(
            request,
            token_count,
            &self.config,
            last_usage,
            &self.failover,
            scope,
        ) {
            Ok(selection) => selection,
            Err(e) => {
                warn!(error = %e, "Route selection failed; falling back to default route");
                self.fallback(request, scope)
            }
        }
    }

    fn fallback(&self, request: &ChatRequest, scope: &RoutingScope) -> Selection {
        let Some(default) = self.config.router.target(RouteKind::Default) else {
            warn!(model = %request.model, "No default route; keeping requested model");
            return Selection::new(request.model.clone(), RouteKind::Fallback);
        };
        match resolve(default, &self.failover, scope) {
            Ok(model) => Selection::new(model, RouteKind::Fallback),
            Err(e) => {
                debug!(error = %e, "Default route unresolvable; trying its first identifier");
                let model = default.first().unwrap_or(request.model.as_str()).to_string();
                Selection::new(model, RouteKind::Fallback)
            }
        }
    }

    /// Clear failure bookkeeping after the upstream call for `decision` succeeded.
    pub fn report_success(&self, decision: &RouteDecision) -> bool {
        self.failover.record_success(&decision.model, &decision.scope)
    }

    /// Record an upstream failure for `decision`; non-retryable errors are ignored.
    pub fn report_failure(&self, decision: &RouteDecision, error: Option<&ErrorInfo>) -> bool {
        self.failover
            .record_failure(&decision.model, &decision.scope, error)
    }

    /// Remember the usage an upstream reported for `session_id`.
    pub fn record_usage(&self, session_id: &str, usage: Usage) {
        self.usage.put(session_id, usage);
    }
}
