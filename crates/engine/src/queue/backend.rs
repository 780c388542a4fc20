// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Backend trait abstraction for the client queue store.
//!
//! The broker layers above the queue engine (flow control, session
//! takeover, the clean-up scheduler) are written against this trait and
//! stay agnostic of where entries actually live:
//!
//! ```text
//!   QueueBackend                 -- identity-resolved operation surface
//!        │ implemented by
//!        ▼
//!   InMemoryQueuePersistence     -- bucket-sharded process-local store
//! ```
//!
//! Implementations resolve identities to buckets internally; the two
//! maintenance operations stay bucket-addressed because schedulers walk
//! the store one bucket at a time. The concrete in-memory type
//! additionally exposes every operation in an explicit `*_in_bucket`
//! shape for callers that pre-partition their work.

use crate::queue::error::QueueEngineError;
use crate::queue::types::{
    AddOutcome, DeliveryId, InflightMessage, PolledMessage, QueuePublish, Timestamp, UniqueId,
};
use mqtt_dp_config::queue::EvictionPolicy;

/// Operation surface of a client queue store.
///
/// All operations are synchronous and linearized per bucket. Capacity
/// pressure never surfaces as an `Err`; the error type covers caller bugs
/// (invalid timestamps, out-of-range buckets) only.
pub trait QueueBackend: Send + Sync {
    /// Number of buckets the store is sharded into.
    fn bucket_count(&self) -> usize;

    /// Admits one message into the queue identified by `queue_id` and `shared`.
    fn add(
        &self,
        queue_id: &str,
        shared: bool,
        publish: QueuePublish,
        max_queue_len: usize,
        policy: EvictionPolicy,
        retained: bool,
    ) -> Result<AddOutcome, QueueEngineError>;

    /// Admits a batch of messages under a single lock acquisition.
    ///
    /// Outcomes are reported per message, in offer order, and each message
    /// is judged against the occupancy left behind by its predecessors.
    fn add_batch(
        &self,
        queue_id: &str,
        shared: bool,
        publishes: Vec<QueuePublish>,
        max_queue_len: usize,
        policy: EvictionPolicy,
        retained: bool,
    ) -> Result<Vec<AddOutcome>, QueueEngineError>;

    /// Hands out messages that have never been delivered.
    ///
    /// Acknowledged-delivery messages are stamped with the supplied
    /// identifiers, in order, and stay queued as inflight entries.
    /// Best-effort messages leave the queue at this point. The identifier
    /// list bounds the total batch; `byte_limit` is a watermark, so the
    /// entry that crosses it is still included.
    fn read_new(
        &self,
        queue_id: &str,
        shared: bool,
        delivery_ids: &[DeliveryId],
        byte_limit: u64,
        now: Timestamp,
    ) -> Result<Vec<PolledMessage>, QueueEngineError>;

    /// Hands out entries with outstanding delivery attempts, completion
    /// markers first, for redelivery after a session is re-established.
    fn read_inflight(
        &self,
        queue_id: &str,
        shared: bool,
        max_count: usize,
        byte_limit: u64,
    ) -> Result<Vec<InflightMessage>, QueueEngineError>;

    /// Settles the publish phase of an exactly-once delivery on a client
    /// session queue, converting the inflight message into a completion
    /// marker in place.
    ///
    /// Returns the unique id of the converted message, or `None` when the
    /// identifier matched an existing marker (a repeat) or nothing at all
    /// (a fresh marker is recorded at the queue front in that case).
    fn replace(
        &self,
        queue_id: &str,
        delivery_id: DeliveryId,
    ) -> Result<Option<UniqueId>, QueueEngineError>;

    /// Retires an acknowledged entry from a client session queue.
    ///
    /// When `expected_unique_id` is supplied, the entry is only removed if
    /// its identity matches; a stale acknowledgement aimed at a recycled
    /// delivery identifier then leaves the queue untouched. Returns the
    /// unique id of a removed message; removing a marker returns `None`.
    fn remove(
        &self,
        queue_id: &str,
        delivery_id: DeliveryId,
        expected_unique_id: Option<UniqueId>,
    ) -> Result<Option<UniqueId>, QueueEngineError>;

    /// Removes every pending message with the given unique id from a
    /// shared group queue, regardless of claim state.
    fn remove_shared(&self, group_id: &str, unique_id: UniqueId)
    -> Result<(), QueueEngineError>;

    /// Returns a claimed shared group message to the pending pool by
    /// clearing its delivery identifier in place.
    fn remove_in_flight_marker(
        &self,
        group_id: &str,
        unique_id: UniqueId,
    ) -> Result<(), QueueEngineError>;

    /// Drops every best-effort message from one queue.
    fn remove_all_qos0_messages(
        &self,
        queue_id: &str,
        shared: bool,
    ) -> Result<(), QueueEngineError>;

    /// Number of entries in one queue, completion markers included.
    fn size(&self, queue_id: &str, shared: bool) -> Result<usize, QueueEngineError>;

    /// Number of best-effort entries in one queue.
    fn qos0_size(&self, queue_id: &str, shared: bool) -> Result<usize, QueueEngineError>;

    /// Removes one queue outright, releasing every payload reference it
    /// still holds.
    fn clear(&self, queue_id: &str, shared: bool) -> Result<(), QueueEngineError>;

    /// Sweeps one bucket: drops expired entries, forgets emptied queues,
    /// and returns the identities of the shared group queues it visited.
    fn clean_up(&self, bucket: usize, now: Timestamp) -> Result<Vec<String>, QueueEngineError>;

    /// Drops every queue in one bucket without releasing payload
    /// references, for process shutdown.
    fn close_bucket(&self, bucket: usize) -> Result<(), QueueEngineError>;
}
