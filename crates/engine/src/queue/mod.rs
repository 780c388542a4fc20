// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Client message queues.
//!
//! Every client session and every shared subscription group owns one
//! queue of undelivered messages. The store is sharded into buckets by a
//! deterministic hash of the queue identity; one lock per bucket
//! linearizes all operations that touch it, so callers may work several
//! buckets in parallel without coordination.
//!
//! Acknowledged deliveries (QoS 1 and 2) stay queued until the protocol
//! layer confirms them: `read_new` stamps delivery identifiers onto
//! pending entries, `replace` settles the publish phase of exactly-once
//! deliveries, and `remove` retires entries once acknowledged.
//! Best-effort messages (QoS 0) are fire-and-forget and leave the queue
//! the moment they are read. Capacity pressure is resolved by dropping
//! messages, never by blocking the publisher.

mod backend;
mod bucket;
mod contract;
mod error;
mod expiry;
mod in_memory;
mod types;

pub use backend::QueueBackend;
pub use bucket::bucket_of;
pub use contract::{MessageDroppedNotifier, PayloadRefCounter};
pub use error::QueueEngineError;
pub use expiry::is_expired;
pub use in_memory::InMemoryQueuePersistence;
pub use types::{
    AddOutcome, DeliveryId, DropReason, InflightMessage, PayloadId, PolledMessage, QosLevel,
    QueueKey, QueuePublish, Timestamp, UniqueId,
};
