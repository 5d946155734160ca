//! Model selection for chat-completion requests: heuristics, failover resolution, and request adaptation.

pub mod adapter;
pub mod custom;
pub mod policy;
pub mod router;
pub mod subagent;
pub mod tokens;
pub mod usage;

pub use adapter::{UpstreamTarget, apply_provider_body_rules, resolve_upstream, upstream_body};
pub use custom::{CustomRouter, PromptRuleRouter};
pub use policy::{Selection, resolve, select_model};
pub use router::{ModelRouter, RouteDecision};
pub use subagent::{SUBAGENT_CLOSE_TAG, SUBAGENT_OPEN_TAG, take_subagent_model};
pub use tokens::{CharEstimateCounter, TiktokenCounter, TokenCounter, count_request_tokens};
pub use usage::{Usage, UsageCache};
