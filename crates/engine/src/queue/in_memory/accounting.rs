// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Memory gauges for the in-memory queue store.

use mqtt_dp_config::queue::QueueConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Process-wide byte gauges over every bucket of the store.
///
/// Gauges are only mutated while a bucket lock is held, one update per
/// stored or retired entry, so each gauge equals the exact sum of the
/// estimated sizes of the entries it covers. Reads are unsynchronized
/// snapshots for admission checks and monitoring.
#[derive(Debug, Default)]
pub(super) struct MemoryAccountant {
    total_bytes: AtomicU64,
    qos0_bytes: AtomicU64,
}

impl MemoryAccountant {
    /// Records `bytes` of newly stored entries, of which `qos0_bytes`
    /// belong to best-effort messages.
    pub(super) fn record_stored(&self, bytes: u64, qos0_bytes: u64) {
        let _ = self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        let _ = self.qos0_bytes.fetch_add(qos0_bytes, Ordering::Relaxed);
    }

    /// Records `bytes` of retired entries, of which `qos0_bytes` belonged
    /// to best-effort messages.
    pub(super) fn record_released(&self, bytes: u64, qos0_bytes: u64) {
        let _ = self.total_bytes.fetch_sub(bytes, Ordering::Relaxed);
        let _ = self.qos0_bytes.fetch_sub(qos0_bytes, Ordering::Relaxed);
    }

    /// Estimated bytes of all stored entries.
    pub(super) fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Estimated bytes of stored best-effort entries.
    pub(super) fn qos0_bytes(&self) -> u64 {
        self.qos0_bytes.load(Ordering::Relaxed)
    }
}

/// Resolves the process-wide best-effort memory ceiling.
///
/// An absolute configured ceiling wins; otherwise the ceiling is carved
/// out of the memory grant the engine was constructed with.
pub(super) fn resolve_qos0_memory_limit(config: &QueueConfig, available_memory_bytes: u64) -> u64 {
    if let Some(limit_bytes) = config.qos0_memory_bytes {
        debug!(limit_bytes, "using configured best-effort memory ceiling");
        return limit_bytes;
    }
    let limit_bytes = available_memory_bytes / config.qos0_memory_divisor;
    debug!(
        limit_bytes,
        divisor = config.qos0_memory_divisor,
        "derived best-effort memory ceiling from memory grant"
    );
    limit_bytes
}
