//! Routing scopes: the unit of isolation for rotation and failure state.

use serde::Serialize;
use std::fmt;

/// Key shared by every request that carries no session identifier.
pub const GLOBAL_SCOPE_KEY: &str = "global";

const SESSION_KEY_PREFIX: &str = "session:";

/// Requests with the same scope share rotation/failure state; different
/// scopes never observe each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoutingScope(String);

impl RoutingScope {
    pub fn global() -> Self {
        Self(GLOBAL_SCOPE_KEY.to_string())
    }

    pub fn session(session_id: &str) -> Self {
        Self(format!("{SESSION_KEY_PREFIX}{session_id}"))
    }

    /// Session scope when an id is present, otherwise the global scope.
    pub fn from_session(session_id: Option<&str>) -> Self {
        match session_id {
            Some(id) => Self::session(id),
            None => Self::global(),
        }
    }

    pub fn key(&self) -> &str {
        &self.0
    }

    pub fn session_id(&self) -> Option<&str> {
        self.0.strip_prefix(SESSION_KEY_PREFIX)
    }

    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_SCOPE_KEY
    }
}

impl Default for RoutingScope {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Display for RoutingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_scope_key() {
        let scope = RoutingScope::session("abc");
        assert_eq!(scope.key(), "session:abc");
        assert_eq!(scope.session_id(), Some("abc"));
        assert!(!scope.is_global());
    }

    #[test]
    fn test_missing_session_maps_to_global() {
        let scope = RoutingScope::from_session(None);
        assert_eq!(scope, RoutingScope::global());
        assert_eq!(scope.key(), GLOBAL_SCOPE_KEY);
        assert_eq!(scope.session_id(), None);
        assert!(scope.is_global());
    }

    #[test]
    fn test_session_named_global_does_not_collide() {
        assert_ne!(RoutingScope::session("global"), RoutingScope::global());
    }
}
