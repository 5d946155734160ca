//! Scheduler: failover-aware candidate rotation, routing scopes, and retryable-error classification.

pub mod failover;
pub mod retry;
pub mod scope;

pub use failover::{FailoverManager, FailoverPolicy, FailoverRecord, FailureStreak};
pub use retry::{ErrorInfo, RetryReason, is_retryable};
pub use scope::{GLOBAL_SCOPE_KEY, RoutingScope};
