/// Config schema types (labels, cache, dispatch, assistant, loki, sinks).
use std::time::Duration;

use {
    kvnts_common::Labels,
    serde::{Deserialize, Serialize},
};

use crate::sink::SinkEntry;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KvntsConfig {
    /// Labels attached to every notification (e.g. `cluster_name`).
    pub labels: Labels,
    pub cache: CacheConfig,
    pub dispatch: DispatchConfig,
    pub assistant: AssistantConfig,
    pub loki: LokiConfig,
    pub sinks: Vec<SinkEntry>,
}

impl KvntsConfig {
    /// Scope used to build sink identities.
    pub fn cluster_name(&self) -> &str {
        self.labels
            .get(kvnts_common::labels::CLUSTER_NAME)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Sink client cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live sink clients.
    pub capacity: usize,
    /// Lifetime of a cached client before it is rebuilt.
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            ttl_secs: 3600,
        }
    }
}

/// What the dispatcher does after a sink fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing sink and ask the caller to retry the event.
    #[default]
    FailFast,
    /// Attempt every sink, then report all failures together.
    BestEffort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub failure_policy: FailurePolicy,
    /// Delay the caller should wait before re-dispatching a failed event.
    pub retry_after_secs: u64,
    /// Dispatch attempts per event, including the first.
    pub max_attempts: u32,
}

impl DispatchConfig {
    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::FailFast,
            retry_after_secs: 5,
            max_attempts: 3,
        }
    }
}

/// AI assistant used to answer "ask assistant" button clicks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// When disabled, messages carry no assistant button and no listener runs.
    pub enabled: bool,
    /// Model override; `OPENAI_MODEL` or the built-in default otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// OpenAI-compatible API base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            base_url: None,
        }
    }
}

/// Event log pushed to Grafana Loki.
///
/// Every event is recorded, `Normal` ones included, labelled like the
/// notification it may turn into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LokiConfig {
    /// Base URL such as `http://loki:3100`. Empty disables the event log.
    pub url: String,
    /// Sent as `X-Scope-OrgID` to multi-tenant deployments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl LokiConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: KvntsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.cache.capacity, 32);
        assert_eq!(cfg.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.dispatch.failure_policy, FailurePolicy::FailFast);
        assert_eq!(cfg.dispatch.retry_after(), Duration::from_secs(5));
        assert!(cfg.assistant.enabled);
        assert!(!cfg.loki.is_enabled());
        assert!(cfg.sinks.is_empty());
        assert_eq!(cfg.cluster_name(), "");
    }

    #[test]
    fn full_config_parses() {
        let cfg: KvntsConfig = toml::from_str(
            r#"
            [labels]
            cluster_name = "prod-eu"

            [cache]
            capacity = 8
            ttl_secs = 60

            [dispatch]
            failure_policy = "best_effort"

            [loki]
            url = "http://loki:3100"
            tenant_id = "ops"

            [[sinks]]
            namespace = "ops"
            name = "alerts"
            type = "slack"
            excluded_reasons = ["Pulled"]

            [sinks.slack]
            bot_token = "xoxb-1"
            app_level_token = "xapp-1"
            channel_id = "C0123"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cluster_name(), "prod-eu");
        assert_eq!(cfg.cache.capacity, 8);
        assert_eq!(cfg.dispatch.failure_policy, FailurePolicy::BestEffort);
        assert!(cfg.loki.is_enabled());
        assert_eq!(cfg.loki.tenant_id.as_deref(), Some("ops"));
        assert_eq!(cfg.sinks.len(), 1);
        assert!(cfg.sinks[0].excludes("Pulled"));
        assert!(cfg.sinks[0].sink_config().is_ok());
    }
}
