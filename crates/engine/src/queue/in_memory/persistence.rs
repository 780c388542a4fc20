// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

use super::accounting::{MemoryAccountant, resolve_qos0_memory_limit};
use super::queue_state::{ClientQueue, ReclaimedEntries, RemoveOutcome, ReplaceOutcome};
use crate::queue::backend::QueueBackend;
use crate::queue::bucket::bucket_of;
use crate::queue::contract::{MessageDroppedNotifier, PayloadRefCounter};
use crate::queue::error::QueueEngineError;
use crate::queue::types::{
    AddOutcome, DeliveryId, DropReason, InflightMessage, PolledMessage, QosLevel, QueueKey,
    QueuePublish, Timestamp, UniqueId,
};
use mqtt_dp_config::TopicName;
use mqtt_dp_config::queue::{EvictionPolicy, QueueConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct QueueStore {
    queues: HashMap<QueueKey, ClientQueue>,
}

/// Process-local client queue store, sharded into lock-protected buckets.
///
/// Every operation resolves its queue to one bucket, takes that bucket's
/// lock, and runs to completion inside it; collaborator callbacks run
/// under the lock too. Operations on different buckets never contend.
pub struct InMemoryQueuePersistence {
    buckets: Vec<Mutex<QueueStore>>,
    payloads: Arc<dyn PayloadRefCounter>,
    drop_notifier: Arc<dyn MessageDroppedNotifier>,
    accountant: MemoryAccountant,
    retained_queue_limit: usize,
    qos0_queue_memory_limit: u64,
    qos0_memory_limit: u64,
    expire_inflight_messages: bool,
    expire_inflight_markers: bool,
}

impl InMemoryQueuePersistence {
    /// Builds a store from a validated configuration.
    ///
    /// `available_memory_bytes` is the memory grant the process-wide
    /// best-effort ceiling is carved out of when no absolute ceiling is
    /// configured.
    pub fn new(
        config: &QueueConfig,
        available_memory_bytes: u64,
        payloads: Arc<dyn PayloadRefCounter>,
        drop_notifier: Arc<dyn MessageDroppedNotifier>,
    ) -> Result<Self, QueueEngineError> {
        let errors = config.validation_errors("queue");
        if !errors.is_empty() {
            return Err(QueueEngineError::InvalidConfig {
                reason: errors.join("; "),
            });
        }
        let qos0_memory_limit = resolve_qos0_memory_limit(config, available_memory_bytes);
        let buckets = (0..config.bucket_count)
            .map(|_| Mutex::new(QueueStore::default()))
            .collect();
        Ok(Self {
            buckets,
            payloads,
            drop_notifier,
            accountant: MemoryAccountant::default(),
            retained_queue_limit: config.retained_queue_size,
            qos0_queue_memory_limit: config.qos0_queue_memory_bytes,
            qos0_memory_limit,
            expire_inflight_messages: config.expire_inflight_messages,
            expire_inflight_markers: config.expire_inflight_markers,
        })
    }

    /// Bucket a queue identity resolves to.
    #[must_use]
    pub fn bucket_for(&self, queue_id: &str) -> usize {
        bucket_of(queue_id, self.buckets.len())
    }

    /// Estimated bytes of all stored entries, across every bucket.
    #[must_use]
    pub fn total_memory_bytes(&self) -> u64 {
        self.accountant.total_bytes()
    }

    /// Estimated bytes of stored best-effort entries, across every bucket.
    #[must_use]
    pub fn qos0_memory_bytes(&self) -> u64 {
        self.accountant.qos0_bytes()
    }

    /// Estimated best-effort bytes held by one client session queue.
    #[must_use]
    pub fn qos0_queue_bytes(&self, queue_id: &str) -> u64 {
        let store = self.buckets[self.bucket_for(queue_id)].lock();
        store
            .queues
            .get(&QueueKey::session(queue_id))
            .map_or(0, ClientQueue::qos0_bytes)
    }

    /// Explicit-bucket form of [`QueueBackend::add`].
    pub fn add_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        publish: QueuePublish,
        max_queue_len: usize,
        policy: EvictionPolicy,
        retained: bool,
        bucket: usize,
    ) -> Result<AddOutcome, QueueEngineError> {
        let mut outcomes = self.add_batch_in_bucket(
            queue_id,
            shared,
            vec![publish],
            max_queue_len,
            policy,
            retained,
            bucket,
        )?;
        Ok(outcomes.pop().expect("one admission yields one outcome"))
    }

    /// Explicit-bucket form of [`QueueBackend::add_batch`].
    pub fn add_batch_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        publishes: Vec<QueuePublish>,
        max_queue_len: usize,
        policy: EvictionPolicy,
        retained: bool,
        bucket: usize,
    ) -> Result<Vec<AddOutcome>, QueueEngineError> {
        let bucket = self.checked_bucket(bucket)?;
        if publishes.iter().any(|publish| publish.timestamp.0 == 0) {
            return Err(QueueEngineError::InvalidTimestamp {
                queue_id: queue_id.to_owned(),
            });
        }
        let mut store = bucket.lock();
        let queue = store
            .queues
            .entry(QueueKey::new(queue_id, shared))
            .or_default();
        let mut outcomes = Vec::with_capacity(publishes.len());
        for publish in publishes {
            self.payloads.increment(publish.payload);
            let outcome = if publish.qos.is_best_effort() {
                self.admit_qos0(queue, queue_id, shared, publish)
            } else {
                self.admit_qos12(
                    queue,
                    queue_id,
                    shared,
                    publish,
                    retained,
                    max_queue_len,
                    &policy,
                )
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Explicit-bucket form of [`QueueBackend::read_new`].
    pub fn read_new_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        delivery_ids: &[DeliveryId],
        byte_limit: u64,
        now: Timestamp,
        bucket: usize,
    ) -> Result<Vec<PolledMessage>, QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        let Some(queue) = store.queues.get_mut(&QueueKey::new(queue_id, shared)) else {
            return Ok(Vec::new());
        };
        let messages = queue.poll_new(delivery_ids, byte_limit, now);
        for message in &messages {
            if !message.delivery_id.is_assigned() {
                self.payloads.decrement(message.publish.payload);
                self.accountant
                    .record_released(message.publish.size_bytes, message.publish.size_bytes);
            }
        }
        Ok(messages)
    }

    /// Explicit-bucket form of [`QueueBackend::read_inflight`].
    pub fn read_inflight_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        max_count: usize,
        byte_limit: u64,
        bucket: usize,
    ) -> Result<Vec<InflightMessage>, QueueEngineError> {
        let store = self.checked_bucket(bucket)?.lock();
        Ok(store
            .queues
            .get(&QueueKey::new(queue_id, shared))
            .map_or_else(Vec::new, |queue| queue.read_inflight(max_count, byte_limit)))
    }

    /// Explicit-bucket form of [`QueueBackend::replace`].
    pub fn replace_in_bucket(
        &self,
        queue_id: &str,
        delivery_id: DeliveryId,
        bucket: usize,
    ) -> Result<Option<UniqueId>, QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        let queue = store
            .queues
            .entry(QueueKey::session(queue_id))
            .or_default();
        match queue.replace(delivery_id) {
            ReplaceOutcome::Converted {
                unique_id,
                payload,
                freed_bytes,
            } => {
                self.payloads.decrement(payload);
                self.accountant.record_released(freed_bytes, 0);
                Ok(Some(unique_id))
            }
            ReplaceOutcome::Refreshed | ReplaceOutcome::Recorded => Ok(None),
        }
    }

    /// Explicit-bucket form of [`QueueBackend::remove`].
    pub fn remove_in_bucket(
        &self,
        queue_id: &str,
        delivery_id: DeliveryId,
        expected_unique_id: Option<UniqueId>,
        bucket: usize,
    ) -> Result<Option<UniqueId>, QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        let Some(queue) = store.queues.get_mut(&QueueKey::session(queue_id)) else {
            return Ok(None);
        };
        match queue.remove(delivery_id, expected_unique_id) {
            RemoveOutcome::Publish {
                unique_id,
                payload,
                freed_bytes,
            } => {
                self.payloads.decrement(payload);
                self.accountant.record_released(freed_bytes, 0);
                Ok(Some(unique_id))
            }
            RemoveOutcome::Marker | RemoveOutcome::Mismatch | RemoveOutcome::NotFound => Ok(None),
        }
    }

    /// Explicit-bucket form of [`QueueBackend::remove_shared`].
    pub fn remove_shared_in_bucket(
        &self,
        group_id: &str,
        unique_id: UniqueId,
        bucket: usize,
    ) -> Result<(), QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        let Some(queue) = store.queues.get_mut(&QueueKey::shared_group(group_id)) else {
            return Ok(());
        };
        let reclaimed = queue.remove_by_unique_id(unique_id);
        self.apply_reclaimed(reclaimed);
        Ok(())
    }

    /// Explicit-bucket form of [`QueueBackend::remove_in_flight_marker`].
    pub fn remove_in_flight_marker_in_bucket(
        &self,
        group_id: &str,
        unique_id: UniqueId,
        bucket: usize,
    ) -> Result<(), QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        if let Some(queue) = store.queues.get_mut(&QueueKey::shared_group(group_id)) {
            queue.clear_claim(unique_id);
        }
        Ok(())
    }

    /// Explicit-bucket form of [`QueueBackend::remove_all_qos0_messages`].
    pub fn remove_all_qos0_messages_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        bucket: usize,
    ) -> Result<(), QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        if let Some(queue) = store.queues.get_mut(&QueueKey::new(queue_id, shared)) {
            let reclaimed = queue.drain_qos0();
            self.apply_reclaimed(reclaimed);
        }
        Ok(())
    }

    /// Explicit-bucket form of [`QueueBackend::size`].
    pub fn size_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        bucket: usize,
    ) -> Result<usize, QueueEngineError> {
        let store = self.checked_bucket(bucket)?.lock();
        Ok(store
            .queues
            .get(&QueueKey::new(queue_id, shared))
            .map_or(0, ClientQueue::len))
    }

    /// Explicit-bucket form of [`QueueBackend::qos0_size`].
    pub fn qos0_size_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        bucket: usize,
    ) -> Result<usize, QueueEngineError> {
        let store = self.checked_bucket(bucket)?.lock();
        Ok(store
            .queues
            .get(&QueueKey::new(queue_id, shared))
            .map_or(0, ClientQueue::qos0_len))
    }

    /// Explicit-bucket form of [`QueueBackend::clear`].
    pub fn clear_in_bucket(
        &self,
        queue_id: &str,
        shared: bool,
        bucket: usize,
    ) -> Result<(), QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        if let Some(queue) = store.queues.remove(&QueueKey::new(queue_id, shared)) {
            let reclaimed = queue.into_reclaimed();
            self.apply_reclaimed(reclaimed);
        }
        Ok(())
    }

    /// Sweeps one bucket: drops expired entries, forgets emptied queues,
    /// and returns the identities of the shared group queues it visited.
    pub fn clean_up(
        &self,
        bucket: usize,
        now: Timestamp,
    ) -> Result<Vec<String>, QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        let mut shared_groups = Vec::new();
        let mut reclaimed_messages = 0usize;
        store.queues.retain(|key, queue| {
            if key.shared {
                shared_groups.push(key.queue_id.clone());
            }
            let reclaimed =
                queue.sweep_expired(now, self.expire_inflight_messages, self.expire_inflight_markers);
            reclaimed_messages += reclaimed.payloads.len();
            self.apply_reclaimed(reclaimed);
            !queue.is_empty()
        });
        trace!(bucket, reclaimed_messages, "swept expired queued messages");
        Ok(shared_groups)
    }

    /// Drops every queue in one bucket without releasing payload
    /// references, for process shutdown.
    pub fn close_bucket(&self, bucket: usize) -> Result<(), QueueEngineError> {
        let mut store = self.checked_bucket(bucket)?.lock();
        let mut bytes = 0u64;
        let mut qos0_bytes = 0u64;
        for queue in store.queues.values() {
            bytes += queue.total_bytes();
            qos0_bytes += queue.qos0_bytes();
        }
        let queues = store.queues.len();
        store.queues.clear();
        self.accountant.record_released(bytes, qos0_bytes);
        debug!(bucket, queues, released_bytes = bytes, "dropped all queues in bucket");
        Ok(())
    }

    fn checked_bucket(&self, bucket: usize) -> Result<&Mutex<QueueStore>, QueueEngineError> {
        self.buckets
            .get(bucket)
            .ok_or(QueueEngineError::BucketIndexOutOfRange {
                index: bucket,
                bucket_count: self.buckets.len(),
            })
    }

    fn admit_qos0(
        &self,
        queue: &mut ClientQueue,
        queue_id: &str,
        shared: bool,
        publish: QueuePublish,
    ) -> AddOutcome {
        let global_bytes = self.accountant.qos0_bytes();
        if global_bytes.saturating_add(publish.size_bytes) > self.qos0_memory_limit {
            self.notify_qos0_memory_exceeded(
                queue_id,
                shared,
                &publish,
                global_bytes,
                self.qos0_memory_limit,
            );
            self.payloads.decrement(publish.payload);
            return AddOutcome::Dropped(DropReason::Qos0MemoryExceeded);
        }
        // Shared group queues are only bounded by the process-wide ceiling.
        if !shared
            && queue.qos0_bytes().saturating_add(publish.size_bytes) > self.qos0_queue_memory_limit
        {
            self.notify_qos0_memory_exceeded(
                queue_id,
                shared,
                &publish,
                queue.qos0_bytes(),
                self.qos0_queue_memory_limit,
            );
            self.payloads.decrement(publish.payload);
            return AddOutcome::Dropped(DropReason::Qos0QueueMemoryExceeded);
        }
        let size_bytes = publish.size_bytes;
        queue.push_qos0(publish);
        self.accountant.record_stored(size_bytes, size_bytes);
        AddOutcome::Enqueued
    }

    fn admit_qos12(
        &self,
        queue: &mut ClientQueue,
        queue_id: &str,
        shared: bool,
        publish: QueuePublish,
        retained: bool,
        max_queue_len: usize,
        policy: &EvictionPolicy,
    ) -> AddOutcome {
        let at_capacity = if retained {
            queue.qos12_retained_len() >= self.retained_queue_limit
        } else {
            queue.qos12_non_retained_len() >= max_queue_len
        };
        if at_capacity {
            let evicted = match policy {
                EvictionPolicy::Discard => None,
                EvictionPolicy::DiscardOldest => queue.evict_oldest(retained),
            };
            match evicted {
                Some(evicted) => {
                    self.notify_queue_full(queue_id, shared, &evicted.topic, evicted.qos);
                    self.payloads.decrement(evicted.payload);
                    self.accountant.record_released(evicted.size_bytes, 0);
                }
                None => {
                    self.notify_queue_full(queue_id, shared, &publish.topic, publish.qos);
                    self.payloads.decrement(publish.payload);
                    return AddOutcome::Dropped(if retained {
                        DropReason::RetainedQueueFull
                    } else {
                        DropReason::QueueFull
                    });
                }
            }
        }
        let size_bytes = publish.size_bytes;
        queue.push_qos12(publish, retained);
        self.accountant.record_stored(size_bytes, 0);
        AddOutcome::Enqueued
    }

    fn notify_queue_full(&self, queue_id: &str, shared: bool, topic: &TopicName, qos: QosLevel) {
        if shared {
            self.drop_notifier.queue_full_shared(queue_id, topic, qos);
        } else {
            self.drop_notifier.queue_full(queue_id, topic, qos);
        }
    }

    fn notify_qos0_memory_exceeded(
        &self,
        queue_id: &str,
        shared: bool,
        publish: &QueuePublish,
        current_bytes: u64,
        limit_bytes: u64,
    ) {
        if shared {
            self.drop_notifier.qos0_memory_exceeded_shared(
                queue_id,
                &publish.topic,
                publish.qos,
                current_bytes,
                limit_bytes,
            );
        } else {
            self.drop_notifier.qos0_memory_exceeded(
                queue_id,
                &publish.topic,
                publish.qos,
                current_bytes,
                limit_bytes,
            );
        }
    }

    fn apply_reclaimed(&self, reclaimed: ReclaimedEntries) {
        for payload in &reclaimed.payloads {
            self.payloads.decrement(*payload);
        }
        self.accountant
            .record_released(reclaimed.bytes, reclaimed.qos0_bytes);
    }
}

impl QueueBackend for InMemoryQueuePersistence {
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn add(
        &self,
        queue_id: &str,
        shared: bool,
        publish: QueuePublish,
        max_queue_len: usize,
        policy: EvictionPolicy,
        retained: bool,
    ) -> Result<AddOutcome, QueueEngineError> {
        self.add_in_bucket(
            queue_id,
            shared,
            publish,
            max_queue_len,
            policy,
            retained,
            self.bucket_for(queue_id),
        )
    }

    fn add_batch(
        &self,
        queue_id: &str,
        shared: bool,
        publishes: Vec<QueuePublish>,
        max_queue_len: usize,
        policy: EvictionPolicy,
        retained: bool,
    ) -> Result<Vec<AddOutcome>, QueueEngineError> {
        self.add_batch_in_bucket(
            queue_id,
            shared,
            publishes,
            max_queue_len,
            policy,
            retained,
            self.bucket_for(queue_id),
        )
    }

    fn read_new(
        &self,
        queue_id: &str,
        shared: bool,
        delivery_ids: &[DeliveryId],
        byte_limit: u64,
        now: Timestamp,
    ) -> Result<Vec<PolledMessage>, QueueEngineError> {
        self.read_new_in_bucket(
            queue_id,
            shared,
            delivery_ids,
            byte_limit,
            now,
            self.bucket_for(queue_id),
        )
    }

    fn read_inflight(
        &self,
        queue_id: &str,
        shared: bool,
        max_count: usize,
        byte_limit: u64,
    ) -> Result<Vec<InflightMessage>, QueueEngineError> {
        self.read_inflight_in_bucket(
            queue_id,
            shared,
            max_count,
            byte_limit,
            self.bucket_for(queue_id),
        )
    }

    fn replace(
        &self,
        queue_id: &str,
        delivery_id: DeliveryId,
    ) -> Result<Option<UniqueId>, QueueEngineError> {
        self.replace_in_bucket(queue_id, delivery_id, self.bucket_for(queue_id))
    }

    fn remove(
        &self,
        queue_id: &str,
        delivery_id: DeliveryId,
        expected_unique_id: Option<UniqueId>,
    ) -> Result<Option<UniqueId>, QueueEngineError> {
        self.remove_in_bucket(
            queue_id,
            delivery_id,
            expected_unique_id,
            self.bucket_for(queue_id),
        )
    }

    fn remove_shared(
        &self,
        group_id: &str,
        unique_id: UniqueId,
    ) -> Result<(), QueueEngineError> {
        self.remove_shared_in_bucket(group_id, unique_id, self.bucket_for(group_id))
    }

    fn remove_in_flight_marker(
        &self,
        group_id: &str,
        unique_id: UniqueId,
    ) -> Result<(), QueueEngineError> {
        self.remove_in_flight_marker_in_bucket(group_id, unique_id, self.bucket_for(group_id))
    }

    fn remove_all_qos0_messages(
        &self,
        queue_id: &str,
        shared: bool,
    ) -> Result<(), QueueEngineError> {
        self.remove_all_qos0_messages_in_bucket(queue_id, shared, self.bucket_for(queue_id))
    }

    fn size(&self, queue_id: &str, shared: bool) -> Result<usize, QueueEngineError> {
        self.size_in_bucket(queue_id, shared, self.bucket_for(queue_id))
    }

    fn qos0_size(&self, queue_id: &str, shared: bool) -> Result<usize, QueueEngineError> {
        self.qos0_size_in_bucket(queue_id, shared, self.bucket_for(queue_id))
    }

    fn clear(&self, queue_id: &str, shared: bool) -> Result<(), QueueEngineError> {
        self.clear_in_bucket(queue_id, shared, self.bucket_for(queue_id))
    }

    fn clean_up(&self, bucket: usize, now: Timestamp) -> Result<Vec<String>, QueueEngineError> {
        InMemoryQueuePersistence::clean_up(self, bucket, now)
    }

    fn close_bucket(&self, bucket: usize) -> Result<(), QueueEngineError> {
        InMemoryQueuePersistence::close_bucket(self, bucket)
    }
}
