//! Resolver configuration types and builders

use serde::{Deserialize, Serialize};
use service_builder::builder;

/// Configuration for a [`Resolver`](crate::Resolver)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[builder]
pub struct ResolverConfig {
    /// Identifier field implicitly requested at every level of a field tree
    #[builder(default = "\"id\".to_string()", getter)]
    pub id_field: String,

    /// Memoize loader and initializer calls by call signature within one load
    #[builder(default = "true", getter)]
    pub memoize_calls: bool,

    /// Record a pending call in the memo before awaiting it, so concurrent
    /// callers with the same signature share one invocation
    #[builder(default = "true", getter)]
    pub share_pending_calls: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            memoize_calls: true,
            share_pending_calls: true,
        }
    }
}

impl ResolverConfigBuilder {
    /// Development configuration: every call is memoized and shared
    pub fn development() -> Self {
        ResolverConfigBuilder::new()
            .id_field("id".to_string())
            .memoize_calls(true)
            .share_pending_calls(true)
    }

    /// Testing configuration reproducing the check-then-await-then-write memo,
    /// where concurrent identical calls may both reach the loader
    pub fn testing() -> Self {
        ResolverConfigBuilder::new()
            .id_field("id".to_string())
            .memoize_calls(true)
            .share_pending_calls(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.get_id_field(), "id");
        assert!(*config.get_memoize_calls());
        assert!(*config.get_share_pending_calls());
    }

    #[test]
    fn test_config_builder() {
        let config = ResolverConfigBuilder::new()
            .id_field("uuid".to_string())
            .share_pending_calls(false)
            .build()
            .unwrap();

        assert_eq!(config.get_id_field(), "uuid");
        assert!(*config.get_memoize_calls());
        assert!(!*config.get_share_pending_calls());
    }

    #[test]
    fn test_testing_preset() {
        let config = ResolverConfigBuilder::testing().build().unwrap();
        assert!(!*config.get_share_pending_calls());
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let config: ResolverConfig = serde_json::from_value(serde_json::json!({
            "id_field": "key",
            "memoize_calls": false,
            "share_pending_calls": true
        }))
        .unwrap();
        assert_eq!(config.get_id_field(), "key");
        assert!(!*config.get_memoize_calls());
    }
}
