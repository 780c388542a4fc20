// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

use crate::queue::expiry::is_expired;
use crate::queue::types::{
    DeliveryId, InflightMessage, PayloadId, PolledMessage, QosLevel, QueuePublish, Timestamp,
    UniqueId,
};
use std::collections::VecDeque;

/// One acknowledged-delivery entry: a message that still owes a delivery,
/// or the completion marker left behind once its publish phase settled.
#[derive(Debug)]
pub(super) enum QueueEntry {
    Publish(QueuedPublish),
    Completion(CompletionMarker),
}

impl QueueEntry {
    fn delivery_id(&self) -> DeliveryId {
        match self {
            Self::Publish(publish) => publish.delivery_id,
            Self::Completion(marker) => marker.delivery_id,
        }
    }

    fn unique_id(&self) -> Option<UniqueId> {
        match self {
            Self::Publish(publish) => Some(publish.publish.unique_id),
            Self::Completion(marker) => marker.unique_id,
        }
    }

    fn is_retained(&self) -> bool {
        match self {
            Self::Publish(publish) => publish.retained,
            Self::Completion(marker) => marker.retained,
        }
    }
}

/// A stored message plus its queue-local delivery state.
#[derive(Debug)]
pub(super) struct QueuedPublish {
    pub(super) publish: QueuePublish,
    // Admission-time classification; retained entries count against their
    // own cap and only evict each other.
    pub(super) retained: bool,
    pub(super) delivery_id: DeliveryId,
}

/// Zero-sized stand-in for an exactly-once delivery whose publish phase
/// settled. Holds no payload reference.
#[derive(Debug)]
pub(super) struct CompletionMarker {
    pub(super) delivery_id: DeliveryId,
    // Identity of the replaced message; `None` for markers recorded when
    // the completion request matched nothing.
    pub(super) unique_id: Option<UniqueId>,
    pub(super) retained: bool,
    pub(super) expiry_deadline: Option<Timestamp>,
}

/// Payload references and byte totals freed by a bulk removal.
#[derive(Debug, Default)]
pub(super) struct ReclaimedEntries {
    pub(super) payloads: Vec<PayloadId>,
    pub(super) bytes: u64,
    pub(super) qos0_bytes: u64,
}

/// Result of settling the publish phase against one delivery identifier.
#[derive(Debug)]
pub(super) enum ReplaceOutcome {
    /// An inflight message converted into a completion marker.
    Converted {
        unique_id: UniqueId,
        payload: PayloadId,
        freed_bytes: u64,
    },
    /// A marker for this identifier was already present.
    Refreshed,
    /// Nothing matched; a fresh marker was recorded at the queue front.
    Recorded,
}

/// Result of retiring one acknowledged entry.
#[derive(Debug)]
pub(super) enum RemoveOutcome {
    /// A message left the queue.
    Publish {
        unique_id: UniqueId,
        payload: PayloadId,
        freed_bytes: u64,
    },
    /// A completion marker left the queue; nothing to release.
    Marker,
    /// The identity guard rejected the removal; the entry is untouched.
    Mismatch,
    /// No entry is outstanding under this identifier.
    NotFound,
}

/// Message store of one client session or shared subscription group.
///
/// Acknowledged deliveries and best-effort messages live in separate
/// sub-queues so capacity rules and read interleaving can treat them
/// differently. The byte counters always equal the sum of the estimated
/// sizes of the entries currently stored.
#[derive(Debug, Default)]
pub(super) struct ClientQueue {
    // Pending and inflight QoS 1/2 entries plus completion markers.
    qos12: VecDeque<QueueEntry>,
    // Fire-and-forget QoS 0 messages.
    qos0: VecDeque<QueuedPublish>,
    // Retained-classified entries within `qos12`.
    retained_len: usize,
    total_bytes: u64,
    qos0_bytes: u64,
}

impl ClientQueue {
    pub(super) fn len(&self) -> usize {
        self.qos12.len() + self.qos0.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.qos12.is_empty() && self.qos0.is_empty()
    }

    pub(super) fn qos0_len(&self) -> usize {
        self.qos0.len()
    }

    pub(super) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub(super) fn qos0_bytes(&self) -> u64 {
        self.qos0_bytes
    }

    pub(super) fn qos12_retained_len(&self) -> usize {
        self.retained_len
    }

    pub(super) fn qos12_non_retained_len(&self) -> usize {
        self.qos12.len() - self.retained_len
    }

    pub(super) fn push_qos0(&mut self, publish: QueuePublish) {
        self.total_bytes += publish.size_bytes;
        self.qos0_bytes += publish.size_bytes;
        self.qos0.push_back(QueuedPublish {
            publish,
            retained: false,
            delivery_id: DeliveryId::UNASSIGNED,
        });
    }

    pub(super) fn push_qos12(&mut self, publish: QueuePublish, retained: bool) {
        self.total_bytes += publish.size_bytes;
        if retained {
            self.retained_len += 1;
        }
        self.qos12.push_back(QueueEntry::Publish(QueuedPublish {
            publish,
            retained,
            delivery_id: DeliveryId::UNASSIGNED,
        }));
    }

    /// Removes and returns the oldest pending message of the given
    /// retained classification. Inflight entries and completion markers
    /// are never eviction candidates.
    pub(super) fn evict_oldest(&mut self, retained: bool) -> Option<QueuePublish> {
        let position = self.qos12.iter().position(|entry| match entry {
            QueueEntry::Publish(publish) => {
                !publish.delivery_id.is_assigned() && publish.retained == retained
            }
            QueueEntry::Completion(_) => false,
        })?;
        match self.qos12.remove(position) {
            Some(QueueEntry::Publish(evicted)) => {
                if evicted.retained {
                    self.retained_len -= 1;
                }
                self.total_bytes -= evicted.publish.size_bytes;
                Some(evicted.publish)
            }
            _ => None,
        }
    }

    /// Hands out never-delivered messages, alternating between the two
    /// sub-queues and draining whichever one remains.
    ///
    /// Acknowledged-delivery messages are stamped with the supplied
    /// identifiers in order and stay queued; best-effort messages are
    /// removed at emission and reported under
    /// [`DeliveryId::UNASSIGNED`]. Expired entries are skipped in place
    /// for `clean_up` to reclaim. The identifier list caps the whole
    /// batch; the entry that crosses `byte_limit` is still included.
    pub(super) fn poll_new(
        &mut self,
        delivery_ids: &[DeliveryId],
        byte_limit: u64,
        now: Timestamp,
    ) -> Vec<PolledMessage> {
        let count_limit = delivery_ids.len();
        let mut messages = Vec::new();
        let mut next_id = delivery_ids.iter().copied();
        let mut bytes = 0u64;
        let mut qos12_cursor = 0usize;
        let mut qos0_cursor = 0usize;
        let mut prefer_qos12 = true;

        while messages.len() < count_limit && bytes <= byte_limit {
            let message = if prefer_qos12 {
                self.poll_next_qos12(&mut qos12_cursor, &mut next_id, now)
                    .or_else(|| self.poll_next_qos0(&mut qos0_cursor, now))
            } else {
                self.poll_next_qos0(&mut qos0_cursor, now)
                    .or_else(|| self.poll_next_qos12(&mut qos12_cursor, &mut next_id, now))
            };
            let Some(message) = message else {
                break;
            };
            bytes = bytes.saturating_add(message.publish.size_bytes);
            messages.push(message);
            prefer_qos12 = !prefer_qos12;
        }
        messages
    }

    fn poll_next_qos12(
        &mut self,
        cursor: &mut usize,
        next_id: &mut impl Iterator<Item = DeliveryId>,
        now: Timestamp,
    ) -> Option<PolledMessage> {
        while *cursor < self.qos12.len() {
            match &mut self.qos12[*cursor] {
                QueueEntry::Publish(entry)
                    if !entry.delivery_id.is_assigned()
                        && !is_expired(entry.publish.expiry_deadline, now) =>
                {
                    // The count cap guarantees an identifier is left here.
                    let delivery_id = next_id.next()?;
                    entry.delivery_id = delivery_id;
                    *cursor += 1;
                    return Some(PolledMessage {
                        delivery_id,
                        publish: entry.publish.clone(),
                    });
                }
                _ => *cursor += 1,
            }
        }
        None
    }

    fn poll_next_qos0(&mut self, cursor: &mut usize, now: Timestamp) -> Option<PolledMessage> {
        while *cursor < self.qos0.len() {
            if is_expired(self.qos0[*cursor].publish.expiry_deadline, now) {
                *cursor += 1;
                continue;
            }
            let entry = self
                .qos0
                .remove(*cursor)
                .expect("cursor is bounds-checked against the best-effort sub-queue");
            self.total_bytes -= entry.publish.size_bytes;
            self.qos0_bytes -= entry.publish.size_bytes;
            return Some(PolledMessage {
                delivery_id: DeliveryId::UNASSIGNED,
                publish: entry.publish,
            });
        }
        None
    }

    /// Hands out entries with outstanding delivery attempts, completion
    /// markers ahead of messages, for redelivery into a fresh session.
    pub(super) fn read_inflight(&self, max_count: usize, byte_limit: u64) -> Vec<InflightMessage> {
        let mut messages = Vec::new();
        let mut bytes = 0u64;
        for entry in &self.qos12 {
            if messages.len() == max_count {
                return messages;
            }
            if let QueueEntry::Completion(marker) = entry {
                messages.push(InflightMessage::Completion {
                    delivery_id: marker.delivery_id,
                });
            }
        }
        for entry in &self.qos12 {
            if messages.len() == max_count || bytes > byte_limit {
                break;
            }
            if let QueueEntry::Publish(publish) = entry {
                if publish.delivery_id.is_assigned() {
                    bytes = bytes.saturating_add(publish.publish.size_bytes);
                    messages.push(InflightMessage::Publish {
                        delivery_id: publish.delivery_id,
                        duplicate: true,
                        publish: publish.publish.clone(),
                    });
                }
            }
        }
        messages
    }

    /// Settles the publish phase for one delivery identifier.
    ///
    /// A matching inflight message converts into a completion marker in
    /// place, inheriting expiry and retained classification. A matching
    /// marker means the request is a repeat. No match records a fresh
    /// marker at the queue front so the final acknowledgement can still
    /// be answered after a restart handed out identifiers anew.
    pub(super) fn replace(&mut self, delivery_id: DeliveryId) -> ReplaceOutcome {
        for entry in self.qos12.iter_mut() {
            match entry {
                QueueEntry::Publish(publish)
                    if publish.delivery_id.is_assigned()
                        && publish.delivery_id == delivery_id =>
                {
                    let unique_id = publish.publish.unique_id;
                    let payload = publish.publish.payload;
                    let freed_bytes = publish.publish.size_bytes;
                    let marker = CompletionMarker {
                        delivery_id,
                        unique_id: Some(unique_id),
                        retained: publish.retained,
                        expiry_deadline: publish.publish.expiry_deadline,
                    };
                    self.total_bytes -= freed_bytes;
                    *entry = QueueEntry::Completion(marker);
                    return ReplaceOutcome::Converted {
                        unique_id,
                        payload,
                        freed_bytes,
                    };
                }
                QueueEntry::Completion(marker) if marker.delivery_id == delivery_id => {
                    return ReplaceOutcome::Refreshed;
                }
                _ => {}
            }
        }
        self.qos12.push_front(QueueEntry::Completion(CompletionMarker {
            delivery_id,
            unique_id: None,
            retained: false,
            expiry_deadline: None,
        }));
        ReplaceOutcome::Recorded
    }

    /// Retires the entry outstanding under `delivery_id`, subject to the
    /// optional identity guard.
    pub(super) fn remove(
        &mut self,
        delivery_id: DeliveryId,
        expected_unique_id: Option<UniqueId>,
    ) -> RemoveOutcome {
        let position = self.qos12.iter().position(|entry| {
            entry.delivery_id().is_assigned() && entry.delivery_id() == delivery_id
        });
        let Some(index) = position else {
            return RemoveOutcome::NotFound;
        };
        if expected_unique_id.is_some() && expected_unique_id != self.qos12[index].unique_id() {
            return RemoveOutcome::Mismatch;
        }
        let Some(entry) = self.qos12.remove(index) else {
            return RemoveOutcome::NotFound;
        };
        if entry.is_retained() {
            self.retained_len -= 1;
        }
        match entry {
            QueueEntry::Publish(publish) => {
                self.total_bytes -= publish.publish.size_bytes;
                RemoveOutcome::Publish {
                    unique_id: publish.publish.unique_id,
                    payload: publish.publish.payload,
                    freed_bytes: publish.publish.size_bytes,
                }
            }
            QueueEntry::Completion(_) => RemoveOutcome::Marker,
        }
    }

    /// Removes every message with the given unique id, claimed or not.
    /// Completion markers are left alone.
    pub(super) fn remove_by_unique_id(&mut self, unique_id: UniqueId) -> ReclaimedEntries {
        let mut reclaimed = ReclaimedEntries::default();
        let mut retained_removed = 0usize;
        self.qos12.retain(|entry| match entry {
            QueueEntry::Publish(publish) if publish.publish.unique_id == unique_id => {
                reclaimed.payloads.push(publish.publish.payload);
                reclaimed.bytes += publish.publish.size_bytes;
                if publish.retained {
                    retained_removed += 1;
                }
                false
            }
            _ => true,
        });
        self.retained_len -= retained_removed;
        self.total_bytes -= reclaimed.bytes;
        reclaimed
    }

    /// Clears the claim on the first message with the given unique id,
    /// returning it to the pending pool in place.
    pub(super) fn clear_claim(&mut self, unique_id: UniqueId) {
        for entry in self.qos12.iter_mut() {
            if let QueueEntry::Publish(publish) = entry {
                if publish.publish.unique_id == unique_id {
                    publish.delivery_id = DeliveryId::UNASSIGNED;
                    return;
                }
            }
        }
    }

    /// Removes every best-effort message.
    pub(super) fn drain_qos0(&mut self) -> ReclaimedEntries {
        let mut reclaimed = ReclaimedEntries::default();
        for entry in self.qos0.drain(..) {
            reclaimed.payloads.push(entry.publish.payload);
            reclaimed.bytes += entry.publish.size_bytes;
        }
        reclaimed.qos0_bytes = reclaimed.bytes;
        self.total_bytes -= reclaimed.bytes;
        self.qos0_bytes = 0;
        reclaimed
    }

    /// Removes expired entries from both sub-queues.
    ///
    /// Exactly-once messages with an outstanding delivery attempt are
    /// protected unless `expire_inflight_messages` is set; completion
    /// markers only expire when `expire_inflight_markers` is set and the
    /// marker inherited a deadline. Markers free no payload reference.
    pub(super) fn sweep_expired(
        &mut self,
        now: Timestamp,
        expire_inflight_messages: bool,
        expire_inflight_markers: bool,
    ) -> ReclaimedEntries {
        let mut reclaimed = ReclaimedEntries::default();

        let mut qos0_freed = 0u64;
        self.qos0.retain(|entry| {
            if is_expired(entry.publish.expiry_deadline, now) {
                reclaimed.payloads.push(entry.publish.payload);
                qos0_freed += entry.publish.size_bytes;
                false
            } else {
                true
            }
        });
        self.qos0_bytes -= qos0_freed;
        self.total_bytes -= qos0_freed;
        reclaimed.bytes += qos0_freed;
        reclaimed.qos0_bytes = qos0_freed;

        let mut qos12_freed = 0u64;
        let mut retained_removed = 0usize;
        self.qos12.retain(|entry| match entry {
            QueueEntry::Publish(publish) => {
                let protected = publish.publish.qos == QosLevel::ExactlyOnce
                    && publish.delivery_id.is_assigned()
                    && !expire_inflight_messages;
                if is_expired(publish.publish.expiry_deadline, now) && !protected {
                    reclaimed.payloads.push(publish.publish.payload);
                    qos12_freed += publish.publish.size_bytes;
                    if publish.retained {
                        retained_removed += 1;
                    }
                    false
                } else {
                    true
                }
            }
            QueueEntry::Completion(marker) => {
                if expire_inflight_markers && is_expired(marker.expiry_deadline, now) {
                    if marker.retained {
                        retained_removed += 1;
                    }
                    false
                } else {
                    true
                }
            }
        });
        self.retained_len -= retained_removed;
        self.total_bytes -= qos12_freed;
        reclaimed.bytes += qos12_freed;

        reclaimed
    }

    /// Consumes the queue and reports everything it held, for `clear`.
    pub(super) fn into_reclaimed(self) -> ReclaimedEntries {
        let mut reclaimed = ReclaimedEntries {
            payloads: Vec::new(),
            bytes: self.total_bytes,
            qos0_bytes: self.qos0_bytes,
        };
        for entry in self.qos12 {
            if let QueueEntry::Publish(publish) = entry {
                reclaimed.payloads.push(publish.publish.payload);
            }
        }
        for entry in self.qos0 {
            reclaimed.payloads.push(entry.publish.payload);
        }
        reclaimed
    }
}
