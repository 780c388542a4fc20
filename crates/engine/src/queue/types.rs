// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Core value types shared across the queue engine.
//!
//! This module defines the data types that flow through the public API. No
//! behavior lives here -- only data definitions and small conversions.
//!
//! # Delivery Identifiers
//!
//! A [`DeliveryId`] is the MQTT packet identifier a message travels under
//! while a delivery attempt is outstanding. The engine never allocates
//! identifiers; callers pass the candidates into `read_new` and the engine
//! stamps them onto entries in order. Two values are reserved:
//! [`DeliveryId::UNASSIGNED`] marks an entry nobody is delivering, and
//! [`DeliveryId::SHARED_CLAIM`] is the claim marker shared-subscription
//! readers use, where the real identifier is only chosen once a group
//! member takes the message onto the wire.
//!
//! # Queue Identity
//!
//! A [`QueueKey`] pairs a textual identity with a shared flag. A client
//! session and a shared subscription group may use the same identity
//! without ever observing each other's messages; the flag keeps their
//! storage disjoint while routing both to the same bucket.

use mqtt_dp_config::TopicName;

/// Opaque handle to a message payload held by the payload store.
///
/// The engine never dereferences the handle; it only forwards it to the
/// [`PayloadRefCounter`](crate::queue::PayloadRefCounter) collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadId(pub u64);

/// Identity assigned to a message when it was first admitted.
///
/// Unique ids outlive delivery identifiers, which are recycled by the
/// protocol layer, and therefore act as the ground truth when a caller
/// must name one specific admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniqueId(pub u64);

/// Packet identifier under which a delivery attempt is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryId(pub u16);

impl DeliveryId {
    /// Sentinel for entries with no outstanding delivery attempt.
    pub const UNASSIGNED: Self = Self(0);
    /// Reserved identifier marking a message claimed by a shared group
    /// reader before a concrete packet identifier exists.
    pub const SHARED_CLAIM: Self = Self(1);

    /// Whether a delivery attempt is outstanding under this identifier.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

/// A point in time, expressed as milliseconds since the Unix epoch.
///
/// The engine never consults a clock; every expiry decision is made
/// against a timestamp supplied by the caller. Zero is not a valid
/// admission timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub u64);

/// MQTT quality-of-service level of a queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    /// Fire-and-forget delivery (QoS 0).
    AtMostOnce,
    /// Acknowledged delivery (QoS 1).
    AtLeastOnce,
    /// Exactly-once delivery (QoS 2).
    ExactlyOnce,
}

impl QosLevel {
    /// Whether this level is delivered without acknowledgement.
    #[must_use]
    pub const fn is_best_effort(self) -> bool {
        matches!(self, Self::AtMostOnce)
    }

    /// The numeric level as it appears on the wire.
    #[must_use]
    pub const fn as_number(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// Identity of one queue: a textual id plus the shared-subscription flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    /// Client identifier or shared subscription group identifier.
    pub queue_id: String,
    /// Whether this is a shared subscription group queue.
    pub shared: bool,
}

impl QueueKey {
    /// Builds a key from an identity and a shared flag.
    pub fn new(queue_id: impl Into<String>, shared: bool) -> Self {
        Self {
            queue_id: queue_id.into(),
            shared,
        }
    }

    /// Key of a client session queue.
    pub fn session(queue_id: impl Into<String>) -> Self {
        Self::new(queue_id, false)
    }

    /// Key of a shared subscription group queue.
    pub fn shared_group(queue_id: impl Into<String>) -> Self {
        Self::new(queue_id, true)
    }
}

/// A message offered to, or handed back by, the queue engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePublish {
    /// Handle to the payload held by the payload store.
    pub payload: PayloadId,
    /// Admission-time identity of this message.
    pub unique_id: UniqueId,
    /// Topic the message was published to.
    pub topic: TopicName,
    /// Quality-of-service level the message is queued under.
    pub qos: QosLevel,
    /// When the message arrived at the broker.
    pub timestamp: Timestamp,
    /// Deadline after which the message must no longer be delivered.
    pub expiry_deadline: Option<Timestamp>,
    /// Estimated in-memory size of the message, in bytes.
    pub size_bytes: u64,
}

/// Result of admitting one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The message was appended to its queue.
    Enqueued,
    /// The message was rejected; its payload reference has been released
    /// and the drop notifier informed.
    Dropped(DropReason),
}

impl AddOutcome {
    /// Whether the message was stored.
    #[must_use]
    pub const fn is_enqueued(self) -> bool {
        matches!(self, Self::Enqueued)
    }
}

/// Why an admission was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Non-retained occupancy reached the queue's entry cap.
    QueueFull,
    /// Retained occupancy reached the retained entry cap.
    RetainedQueueFull,
    /// The process-wide best-effort memory ceiling would be exceeded.
    Qos0MemoryExceeded,
    /// The per-queue best-effort memory ceiling would be exceeded.
    Qos0QueueMemoryExceeded,
}

/// A message handed out by `read_new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledMessage {
    /// Identifier assigned to this delivery attempt. Best-effort messages
    /// are handed out without one and carry [`DeliveryId::UNASSIGNED`].
    pub delivery_id: DeliveryId,
    /// The message itself.
    pub publish: QueuePublish,
}

/// An entry handed out by `read_inflight` for session re-establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InflightMessage {
    /// A completion marker whose final acknowledgement is still owed.
    Completion {
        /// Identifier the original delivery attempt ran under.
        delivery_id: DeliveryId,
    },
    /// A pending message whose delivery attempt was cut short.
    Publish {
        /// Identifier the delivery attempt runs under.
        delivery_id: DeliveryId,
        /// Set on redelivery so the receiver can recognize the retry.
        duplicate: bool,
        /// The message itself.
        publish: QueuePublish,
    },
}
