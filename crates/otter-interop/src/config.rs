//! Converter configuration.
//!
//! Controls how deep nested values are converted and which host
//! collections are proxied instead of copied when they cross into the
//! engine.

use crate::error::{InteropError, InteropResult};
use serde::{Deserialize, Serialize};

/// Default nesting limit for converted values
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Bridge configuration.
///
/// Loadable from JSON; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum nesting of converted collections.
    /// Default: 20
    pub max_depth: usize,

    /// Proxy host maps instead of copying them into plain objects.
    /// Default: false
    pub proxy_map_enabled: bool,

    /// Proxy host sets instead of copying them.
    /// Default: false
    pub proxy_set_enabled: bool,

    /// Proxy host lists instead of copying them into arrays.
    /// Default: false
    pub proxy_list_enabled: bool,

    /// Proxy typed arrays instead of copying them.
    /// Default: false
    pub proxy_array_enabled: bool,

    /// Drop function-valued properties when a plain script object becomes
    /// a host map.
    /// Default: true
    pub skip_functions_in_object: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            proxy_map_enabled: false,
            proxy_set_enabled: false,
            proxy_list_enabled: false,
            proxy_array_enabled: false,
            skip_functions_in_object: true,
        }
    }
}

impl BridgeConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config proxying every collection kind.
    pub fn proxy_collections() -> Self {
        Self {
            proxy_map_enabled: true,
            proxy_set_enabled: true,
            proxy_list_enabled: true,
            proxy_array_enabled: true,
            ..Default::default()
        }
    }

    /// Parse a config from JSON.
    pub fn from_json(text: &str) -> InteropResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| InteropError::host(format!("invalid bridge config: {e}")))
    }

    /// Set the nesting limit.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Enable or disable map proxies.
    pub fn proxy_map(mut self, enabled: bool) -> Self {
        self.proxy_map_enabled = enabled;
        self
    }

    /// Enable or disable set proxies.
    pub fn proxy_set(mut self, enabled: bool) -> Self {
        self.proxy_set_enabled = enabled;
        self
    }

    /// Enable or disable list proxies.
    pub fn proxy_list(mut self, enabled: bool) -> Self {
        self.proxy_list_enabled = enabled;
        self
    }

    /// Enable or disable array proxies.
    pub fn proxy_array(mut self, enabled: bool) -> Self {
        self.proxy_array_enabled = enabled;
        self
    }

    /// Keep or drop function-valued properties of converted objects.
    pub fn skip_functions_in_object(mut self, skip: bool) -> Self {
        self.skip_functions_in_object = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_depth, 20);
        assert!(!config.proxy_map_enabled);
        assert!(config.skip_functions_in_object);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            BridgeConfig::from_json(r#"{"proxy_list_enabled": true, "max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(config.proxy_list_enabled);
        assert!(!config.proxy_set_enabled);
        assert!(config.skip_functions_in_object);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(BridgeConfig::from_json("{\"max_depth\": \"deep\"}").is_err());
    }
}
