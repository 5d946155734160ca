//! Failover-aware round-robin selection among provider candidates.
//!
//! Each routing scope owns one [`FailoverRecord`], created lazily on the first
//! multi-candidate selection. The record rotates a cursor over the
//! *currently available* candidates; retryable failures accumulate a streak
//! that, once it reaches the maximum inside the cooldown window, takes
//! candidates out of rotation. When nothing is left the record is dropped
//! and the first candidate is used, so a request never fails for lack of a
//! provider.
//!
//! All state lives behind one mutex held only for the duration of a single
//! in-memory operation, so concurrent callers on the same scope observe a
//! strict rotation.

use ccr_config::{FailoverSettings, FailureTracking};
use ccr_core::{Result, RouterError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::retry::ErrorInfo;
use crate::scope::RoutingScope;

pub const DEFAULT_COOLDOWN_SECS: i64 = 30;
pub const DEFAULT_MAX_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    /// Time after the latest failure before a saturated streak stops counting.
    pub cooldown: TimeDelta,
    /// Streak length at which candidates leave rotation.
    pub max_failures: u32,
    pub tracking: FailureTracking,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            cooldown: TimeDelta::seconds(DEFAULT_COOLDOWN_SECS),
            max_failures: DEFAULT_MAX_FAILURES,
            tracking: FailureTracking::Scope,
        }
    }
}

impl From<&FailoverSettings> for FailoverPolicy {
    fn from(settings: &FailoverSettings) -> Self {
        let cooldown_secs = i64::try_from(settings.cooldown_secs).unwrap_or(i64::MAX);
        Self {
            cooldown: TimeDelta::try_seconds(cooldown_secs).unwrap_or(TimeDelta::MAX),
            max_failures: settings.max_failures,
            tracking: settings.tracking,
        }
    }
}

/// Consecutive retryable failures and when the latest one happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureStreak {
    pub count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl FailureStreak {
    /// Any of: no failures, cooldown elapsed, or streak still below the maximum.
    fn is_available(&self, now: DateTime<Utc>, policy: &FailoverPolicy) -> bool {
        if self.count == 0 || self.count < policy.max_failures {
            return true;
        }
        match self.last_failure_at {
            Some(at) => now - at > policy.cooldown,
            None => true,
        }
    }

    fn record(&mut self, now: DateTime<Utc>) {
        self.count = self.count.saturating_add(1);
        self.last_failure_at = Some(now);
    }

    fn clear(&mut self) {
        self.count = 0;
        self.last_failure_at = None;
    }
}

/// Rotation and failure state for one routing scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailoverRecord {
    candidates: Vec<String>,
    cursor: usize,
    #[serde(flatten)]
    streak: FailureStreak,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    candidate_streaks: HashMap<String, FailureStreak>,
}

impl FailoverRecord {
    fn new(candidates: &[String]) -> Self {
        Self {
            candidates: candidates.to_vec(),
            cursor: 0,
            streak: FailureStreak::default(),
            candidate_streaks: HashMap::new(),
        }
    }

    /// Candidate snapshot taken when the record was created.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Scope-wide streak (scope tracking only).
    pub fn failure_streak(&self) -> u32 {
        self.streak.count
    }

    /// Scope-wide latest failure (scope tracking only).
    pub fn last_failure_at(&self) -> Option<DateTime<Utc>> {
        self.streak.last_failure_at
    }

    /// Per-candidate streak (candidate tracking only).
    pub fn candidate_streak(&self, provider: &str) -> u32 {
        self.candidate_streaks
            .get(provider)
            .map_or(0, |streak| streak.count)
    }

    fn available(&self, now: DateTime<Utc>, policy: &FailoverPolicy) -> Vec<&str> {
        match policy.tracking {
            FailureTracking::Scope => {
                if self.streak.is_available(now, policy) {
                    self.candidates.iter().map(String::as_str).collect()
                } else {
                    Vec::new()
                }
            }
            FailureTracking::Candidate => self
                .candidates
                .iter()
                .filter(|c| {
                    self.candidate_streaks
                        .get(c.as_str())
                        .is_none_or(|streak| streak.is_available(now, policy))
                })
                .map(String::as_str)
                .collect(),
        }
    }
}

/// Process-wide failover state. Construct once and share by `Arc`.
#[derive(Debug, Default)]
pub struct FailoverManager {
    policy: FailoverPolicy,
    records: Mutex<HashMap<String, FailoverRecord>>,
}

impl FailoverManager {
    pub fn new(policy: FailoverPolicy) -> Self {
        Self {
            policy,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    /// Pick the next candidate for `scope`.
    ///
    /// A single candidate is returned as-is without touching any state.
    /// Fails with [`RouterError::InvalidInput`] on an empty list.
    pub fn select_provider(&self, candidates: &[String], scope: &RoutingScope) -> Result<String> {
        self.select_provider_at(candidates, scope, Utc::now())
    }

    /// [`select_provider`](Self::select_provider) against an explicit clock reading.
    pub fn select_provider_at(
        &self,
        candidates: &[String],
        scope: &RoutingScope,
        now: DateTime<Utc>,
    ) -> Result<String> {
        match candidates {
            [] => {
                return Err(RouterError::InvalidInput(
                    "candidate list must not be empty".to_string(),
                ));
            }
            [only] => return Ok(only.clone()),
            _ => {}
        }

        let mut records = self.records();
        let record = records
            .entry(scope.key().to_string())
            .or_insert_with(|| FailoverRecord::new(candidates));

        let available = record.available(now, &self.policy);
        if available.is_empty() {
            records.remove(scope.key());
            warn!(
                scope = %scope,
                fallback = %candidates[0],
                "All candidates unavailable; resetting scope and using first candidate"
            );
            return Ok(candidates[0].clone());
        }

        let len = available.len();
        let index = record.cursor % len;
        let chosen = available[index].to_string();
        record.cursor = (record.cursor + 1) % len;

        debug!(
            scope = %scope,
            provider = %chosen,
            index,
            available = len,
            total = record.candidates.len(),
            "Failover rotation selected candidate"
        );
        Ok(chosen)
    }

    /// Record an upstream failure for `provider` in `scope`.
    ///
    /// Ignored when the scope has no record or the error is not retryable.
    /// Returns whether any state changed.
    pub fn record_failure(
        &self,
        provider: &str,
        scope: &RoutingScope,
        error: Option<&ErrorInfo>,
    ) -> bool {
        self.record_failure_at(provider, scope, error, Utc::now())
    }

    /// [`record_failure`](Self::record_failure) against an explicit clock reading.
    pub fn record_failure_at(
        &self,
        provider: &str,
        scope: &RoutingScope,
        error: Option<&ErrorInfo>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut records = self.records();
        let Some(record) = records.get_mut(scope.key()) else {
            return false;
        };
        let Some(reason) = error.and_then(ErrorInfo::retry_reason) else {
            debug!(scope = %scope, provider = %provider, "Ignoring non-retryable failure");
            return false;
        };

        let streak = match self.policy.tracking {
            FailureTracking::Scope => &mut record.streak,
            FailureTracking::Candidate => {
                if !record.candidates.iter().any(|c| c == provider) {
                    return false;
                }
                record
                    .candidate_streaks
                    .entry(provider.to_string())
                    .or_default()
            }
        };
        streak.record(now);
        let count = streak.count;

        warn!(
            scope = %scope,
            provider = %provider,
            reason = %reason,
            streak = count,
            "Retryable upstream failure recorded"
        );
        if count == self.policy.max_failures {
            warn!(
                scope = %scope,
                provider = %provider,
                max_failures = self.policy.max_failures,
                cooldown_secs = self.policy.cooldown.num_seconds(),
                "Failure streak reached maximum; cooling down"
            );
        }
        true
    }

    /// Clear failure bookkeeping after a successful upstream call.
    ///
    /// Scope tracking clears the whole scope regardless of `provider`;
    /// candidate tracking clears only `provider`. Returns whether a record
    /// existed to update.
    pub fn record_success(&self, provider: &str, scope: &RoutingScope) -> bool {
        let mut records = self.records();
        let Some(record) = records.get_mut(scope.key()) else {
            return false;
        };
        match self.policy.tracking {
            FailureTracking::Scope => record.streak.clear(),
            FailureTracking::Candidate => {
                if let Some(streak) = record.candidate_streaks.get_mut(provider) {
                    streak.clear();
                }
            }
        }
        debug!(scope = %scope, provider = %provider, "Failure streak cleared");
        true
    }

    /// Forget all rotation/failure state for `scope`. Returns whether a record existed.
    pub fn reset(&self, scope: &RoutingScope) -> bool {
        let removed = self.records().remove(scope.key()).is_some();
        if removed {
            debug!(scope = %scope, "Failover record reset");
        }
        removed
    }

    /// Copy of the record for `scope`, if one exists.
    pub fn snapshot(&self, scope: &RoutingScope) -> Option<FailoverRecord> {
        self.records().get(scope.key()).cloned()
    }

    /// Keys of every live scope, sorted.
    pub fn scopes(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, FailoverRecord>> {
        // Records are plain data and never left half-updated, so a poisoned
        // lock still guards a consistent map.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "failover_tests.rs"]
mod tests;
