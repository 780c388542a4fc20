// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Settings for the client message-queue engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Settings consumed by the in-memory client queue engine.
///
/// The memory ceilings only govern best-effort (QoS 0) traffic;
/// acknowledged deliveries are bounded by entry counts instead.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Number of lock-sharded buckets the queue store is split into.
    #[serde(default = "default_queue_bucket_count")]
    pub bucket_count: usize,
    /// Default cap on non-retained acknowledged-delivery entries per queue.
    #[serde(default = "default_queue_max_queue_size")]
    pub max_queue_size: usize,
    /// Cap on retained acknowledged-delivery entries per queue.
    #[serde(default = "default_queue_retained_queue_size")]
    pub retained_queue_size: usize,
    /// Default behavior when a queue reaches its entry cap.
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,
    /// Best-effort memory ceiling for each client queue, in bytes.
    #[serde(default = "default_queue_qos0_queue_memory_bytes")]
    pub qos0_queue_memory_bytes: u64,
    /// Absolute process-wide best-effort memory ceiling, in bytes.
    ///
    /// When unset, the ceiling is derived from the memory handed to the
    /// engine divided by `qos0_memory_divisor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos0_memory_bytes: Option<u64>,
    /// Divisor applied to the engine's memory grant when no absolute
    /// best-effort ceiling is configured.
    #[serde(default = "default_queue_qos0_memory_divisor")]
    pub qos0_memory_divisor: u64,
    /// Whether expired pending messages may be dropped while a delivery
    /// attempt is still unacknowledged.
    #[serde(default)]
    pub expire_inflight_messages: bool,
    /// Whether expired completion markers may be dropped before their
    /// final acknowledgement arrives.
    #[serde(default)]
    pub expire_inflight_markers: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            bucket_count: default_queue_bucket_count(),
            max_queue_size: default_queue_max_queue_size(),
            retained_queue_size: default_queue_retained_queue_size(),
            eviction_policy: EvictionPolicy::default(),
            qos0_queue_memory_bytes: default_queue_qos0_queue_memory_bytes(),
            qos0_memory_bytes: None,
            qos0_memory_divisor: default_queue_qos0_memory_divisor(),
            expire_inflight_messages: false,
            expire_inflight_markers: false,
        }
    }
}

impl QueueConfig {
    /// Returns validation errors for this queue configuration.
    #[must_use]
    pub fn validation_errors(&self, path_prefix: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if self.bucket_count == 0 {
            errors.push(format!("{path_prefix}.bucket_count must be greater than 0"));
        }
        if self.max_queue_size == 0 {
            errors.push(format!(
                "{path_prefix}.max_queue_size must be greater than 0"
            ));
        }
        if self.retained_queue_size == 0 {
            errors.push(format!(
                "{path_prefix}.retained_queue_size must be greater than 0"
            ));
        }
        if self.qos0_memory_divisor == 0 {
            errors.push(format!(
                "{path_prefix}.qos0_memory_divisor must be greater than 0"
            ));
        }
        errors
    }
}

/// Behavior when a queue reaches its acknowledged-delivery entry cap.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Drop the incoming message and keep queued entries untouched.
    #[default]
    Discard,
    /// Drop the oldest pending entry to make room for the incoming message.
    DiscardOldest,
}

impl std::fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Discard => "discard",
            Self::DiscardOldest => "discard_oldest",
        };
        f.write_str(value)
    }
}

const fn default_queue_bucket_count() -> usize {
    64
}

const fn default_queue_max_queue_size() -> usize {
    1000
}

const fn default_queue_retained_queue_size() -> usize {
    100_000
}

const fn default_queue_qos0_queue_memory_bytes() -> u64 {
    1024 * 1024 * 5
}

const fn default_queue_qos0_memory_divisor() -> u64 {
    4
}

#[cfg(test)]
mod tests {
    use super::{EvictionPolicy, QueueConfig};

    #[test]
    fn defaults_match_expected_values() {
        let config = QueueConfig::default();
        assert_eq!(config.bucket_count, 64);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.retained_queue_size, 100_000);
        assert_eq!(config.eviction_policy, EvictionPolicy::Discard);
        assert_eq!(config.qos0_queue_memory_bytes, 1024 * 1024 * 5);
        assert_eq!(config.qos0_memory_bytes, None);
        assert_eq!(config.qos0_memory_divisor, 4);
        assert!(!config.expire_inflight_messages);
        assert!(!config.expire_inflight_markers);
    }

    #[test]
    fn validates_non_zero_sizes() {
        let config = QueueConfig {
            bucket_count: 0,
            max_queue_size: 0,
            qos0_memory_divisor: 0,
            ..QueueConfig::default()
        };

        let errors = config.validation_errors("persistence.queue");
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|error| error.contains(".bucket_count")));
        assert!(errors.iter().any(|error| error.contains(".max_queue_size")));
        assert!(
            errors
                .iter()
                .any(|error| error.contains(".qos0_memory_divisor"))
        );
    }

    #[test]
    fn deserializes_policy_and_ceiling_overrides() {
        let yaml = r#"
bucket_count: 8
max_queue_size: 16
eviction_policy: discard_oldest
qos0_memory_bytes: 1048576
"#;

        let config: QueueConfig = serde_yaml::from_str(yaml).expect("queue config should parse");
        assert_eq!(config.bucket_count, 8);
        assert_eq!(config.max_queue_size, 16);
        assert_eq!(config.eviction_policy, EvictionPolicy::DiscardOldest);
        assert_eq!(config.qos0_memory_bytes, Some(1_048_576));
        assert_eq!(config.retained_queue_size, 100_000);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<QueueConfig, _> = serde_yaml::from_str("max_inflight_window: 20");
        assert!(result.is_err(), "unknown fields should be rejected");
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config: QueueConfig = serde_yaml::from_str("{}").expect("queue config should parse");
        assert_eq!(config, QueueConfig::default());
    }
}
