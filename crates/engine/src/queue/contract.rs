// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Collaborator contracts the queue engine is wired against.
//!
//! Both collaborators are invoked synchronously while a bucket lock is
//! held, so implementations must be non-blocking or bounded-latency. The
//! engine guarantees it never calls them twice for the same event: one
//! increment per admission attempt, one decrement per retirement, one
//! notification per dropped message.

use crate::queue::types::{PayloadId, QosLevel};
use mqtt_dp_config::TopicName;

/// Reference-counted payload store the engine borrows payloads from.
///
/// Message payloads are stored once and shared between all queues that
/// reference them. The engine takes one reference per admission attempt
/// and returns it on every path that retires the message: delivery of a
/// best-effort message, acknowledgement, eviction, expiry, queue removal,
/// or rejection at admission. Completion markers hold no reference; it is
/// returned at the moment a pending message converts into one.
pub trait PayloadRefCounter: Send + Sync {
    /// Takes one reference to the payload.
    fn increment(&self, payload: PayloadId);

    /// Returns one reference to the payload.
    fn decrement(&self, payload: PayloadId);
}

/// Sink for messages the engine drops without delivering.
///
/// Every silent drop is announced here exactly once, except expiry
/// sweeps, which retire messages that were never going to be delivered
/// anyway. The `current_bytes` and `limit_bytes` arguments of the memory
/// notifications describe the ceiling that rejected the message.
pub trait MessageDroppedNotifier: Send + Sync {
    /// A client session queue rejected or evicted a message at its entry cap.
    fn queue_full(&self, queue_id: &str, topic: &TopicName, qos: QosLevel);

    /// A shared group queue rejected or evicted a message at its entry cap.
    fn queue_full_shared(&self, group_id: &str, topic: &TopicName, qos: QosLevel);

    /// A best-effort message was rejected by a memory ceiling on a client
    /// session queue.
    fn qos0_memory_exceeded(
        &self,
        queue_id: &str,
        topic: &TopicName,
        qos: QosLevel,
        current_bytes: u64,
        limit_bytes: u64,
    );

    /// A best-effort message was rejected by a memory ceiling on a shared
    /// group queue.
    fn qos0_memory_exceeded_shared(
        &self,
        group_id: &str,
        topic: &TopicName,
        qos: QosLevel,
        current_bytes: u64,
        limit_bytes: u64,
    );
}
