// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

use super::InMemoryQueuePersistence;
use crate::queue::backend::QueueBackend;
use crate::queue::contract::{MessageDroppedNotifier, PayloadRefCounter};
use crate::queue::error::QueueEngineError;
use crate::queue::types::{
    AddOutcome, DeliveryId, DropReason, InflightMessage, PayloadId, QosLevel, QueuePublish,
    Timestamp, UniqueId,
};
use mqtt_dp_config::TopicName;
use mqtt_dp_config::queue::{EvictionPolicy, QueueConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub(super) const NOW: Timestamp = Timestamp(1_700_000_000_000);
pub(super) const MEMORY_GRANT: u64 = 64 * 1024 * 1024;
pub(super) const MESSAGE_SIZE: u64 = 100;

/// Payload store double tracking live references per payload handle.
///
/// A negative count means a reference was returned twice, so asserting on
/// exact values catches both leaks and double releases.
#[derive(Default)]
pub(super) struct CountingPayloadStore {
    references: Mutex<HashMap<u64, i64>>,
}

impl CountingPayloadStore {
    pub(super) fn live_references(&self) -> i64 {
        self.references.lock().values().sum()
    }

    pub(super) fn references_for(&self, payload: PayloadId) -> i64 {
        self.references.lock().get(&payload.0).copied().unwrap_or(0)
    }
}

impl PayloadRefCounter for CountingPayloadStore {
    fn increment(&self, payload: PayloadId) {
        *self.references.lock().entry(payload.0).or_insert(0) += 1;
    }

    fn decrement(&self, payload: PayloadId) {
        *self.references.lock().entry(payload.0).or_insert(0) -= 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum DropEvent {
    QueueFull {
        queue_id: String,
        topic: String,
        shared: bool,
    },
    Qos0MemoryExceeded {
        queue_id: String,
        current_bytes: u64,
        limit_bytes: u64,
        shared: bool,
    },
}

/// Drop notifier double recording every notification in call order.
#[derive(Default)]
pub(super) struct RecordingDropNotifier {
    events: Mutex<Vec<DropEvent>>,
}

impl RecordingDropNotifier {
    pub(super) fn events(&self) -> Vec<DropEvent> {
        self.events.lock().clone()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl MessageDroppedNotifier for RecordingDropNotifier {
    fn queue_full(&self, queue_id: &str, topic: &TopicName, _qos: QosLevel) {
        self.events.lock().push(DropEvent::QueueFull {
            queue_id: queue_id.to_owned(),
            topic: topic.as_str().to_owned(),
            shared: false,
        });
    }

    fn queue_full_shared(&self, group_id: &str, topic: &TopicName, _qos: QosLevel) {
        self.events.lock().push(DropEvent::QueueFull {
            queue_id: group_id.to_owned(),
            topic: topic.as_str().to_owned(),
            shared: true,
        });
    }

    fn qos0_memory_exceeded(
        &self,
        queue_id: &str,
        _topic: &TopicName,
        _qos: QosLevel,
        current_bytes: u64,
        limit_bytes: u64,
    ) {
        self.events.lock().push(DropEvent::Qos0MemoryExceeded {
            queue_id: queue_id.to_owned(),
            current_bytes,
            limit_bytes,
            shared: false,
        });
    }

    fn qos0_memory_exceeded_shared(
        &self,
        group_id: &str,
        _topic: &TopicName,
        _qos: QosLevel,
        current_bytes: u64,
        limit_bytes: u64,
    ) {
        self.events.lock().push(DropEvent::Qos0MemoryExceeded {
            queue_id: group_id.to_owned(),
            current_bytes,
            limit_bytes,
            shared: true,
        });
    }
}

pub(super) struct TestEngine {
    pub(super) engine: InMemoryQueuePersistence,
    pub(super) payloads: Arc<CountingPayloadStore>,
    pub(super) drops: Arc<RecordingDropNotifier>,
}

pub(super) fn engine() -> TestEngine {
    engine_with(QueueConfig::default())
}

pub(super) fn engine_with(config: QueueConfig) -> TestEngine {
    let payloads = Arc::new(CountingPayloadStore::default());
    let drops = Arc::new(RecordingDropNotifier::default());
    let engine =
        InMemoryQueuePersistence::new(&config, MEMORY_GRANT, payloads.clone(), drops.clone())
            .expect("engine should build from a valid configuration");
    TestEngine {
        engine,
        payloads,
        drops,
    }
}

/// A message whose payload handle and unique id both equal `sequence`.
pub(super) fn publish(sequence: u64, qos: QosLevel) -> QueuePublish {
    sized_publish(sequence, qos, MESSAGE_SIZE)
}

pub(super) fn sized_publish(sequence: u64, qos: QosLevel, size_bytes: u64) -> QueuePublish {
    QueuePublish {
        payload: PayloadId(sequence),
        unique_id: UniqueId(sequence),
        topic: TopicName::from("sensors/metrics"),
        qos,
        timestamp: NOW,
        expiry_deadline: None,
        size_bytes,
    }
}

pub(super) fn expiring_publish(sequence: u64, qos: QosLevel, deadline: Timestamp) -> QueuePublish {
    QueuePublish {
        expiry_deadline: Some(deadline),
        ..sized_publish(sequence, qos, MESSAGE_SIZE)
    }
}

pub(super) fn ids(raw: &[u16]) -> Vec<DeliveryId> {
    raw.iter().copied().map(DeliveryId).collect()
}

mod admission;
