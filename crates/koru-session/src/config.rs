//! Session manager configuration.

use koru_renewal::RenewalPolicy;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Configuration for a [`SessionManager`](crate::SessionManager).
///
/// Every field has a default, so a host can deserialize a partial document
/// and override only what it cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Renewal and warning timings.
    pub policy: RenewalPolicy,

    /// Where the UI is sent after sign-out. Default: `/`.
    pub root_route: String,

    /// Capacity of the command channel into the session actor.
    /// Default: 64.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: RenewalPolicy::default(),
            root_route: "/".to_string(),
            command_buffer: 64,
        }
    }
}

impl SessionConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamp and fix any out-of-range values.
    ///
    /// Called automatically by [`SessionManager::start`](crate::SessionManager::start).
    pub fn validated(mut self) -> Self {
        self.policy = self.policy.validated();
        if self.root_route.trim().is_empty() {
            tracing::warn!("root_route is empty, using \"/\"");
            self.root_route = "/".to_string();
        }
        if self.command_buffer == 0 {
            tracing::warn!("command_buffer is 0, using 1");
            self.command_buffer = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.root_route, "/");
        assert_eq!(config.command_buffer, 64);
        assert_eq!(config.policy, RenewalPolicy::default());
    }

    #[test]
    fn test_from_json_partial_document() {
        let config = SessionConfig::from_json(r#"{"root_route":"/browse"}"#).unwrap();
        assert_eq!(config.root_route, "/browse");
        assert_eq!(config.policy.refresh_lead, Duration::from_secs(300));
    }

    #[test]
    fn test_from_json_rejects_malformed_document() {
        let result = SessionConfig::from_json("{not json");
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_validated_repairs_empty_route_and_zero_buffer() {
        let config = SessionConfig {
            root_route: "  ".into(),
            command_buffer: 0,
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.root_route, "/");
        assert_eq!(config.command_buffer, 1);
    }
}
