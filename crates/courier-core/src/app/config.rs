//! MediatorConfig - engine options.
//!
//! ```json
//! { "caching_enabled": true, "publish_strategy": "concurrent" }
//! ```
//! Missing fields take their defaults; unknown fields are rejected.

use serde::{Deserialize, Serialize};

use super::publish::PublishStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediatorConfig {
    /// Cache hierarchies, resolved instances and composed pipelines.
    pub caching_enabled: bool,
    pub publish_strategy: PublishStrategy,
}

impl MediatorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    pub fn with_publish_strategy(mut self, strategy: PublishStrategy) -> Self {
        self.publish_strategy = strategy;
        self
    }
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            publish_strategy: PublishStrategy::Sequential,
        }
    }
}
