// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

use super::*;

/// Scenario:
/// 1. Given a full queue under the `discard` policy.
/// 2. When one more message is offered.
/// 3. Then the incoming message is dropped, its payload reference is
///    returned, and the drop notifier fires once.
#[test]
fn discard_rejects_the_incoming_message() {
    let TestEngine { engine, payloads, drops } = engine();
    for sequence in 1..=3 {
        let outcome = engine
            .add("client", false, publish(sequence, QosLevel::AtLeastOnce), 3, EvictionPolicy::Discard, false)
            .expect("admission should succeed");
        assert!(outcome.is_enqueued());
    }

    let outcome = engine
        .add("client", false, publish(4, QosLevel::AtLeastOnce), 3, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert_eq!(outcome, AddOutcome::Dropped(DropReason::QueueFull));
    assert_eq!(engine.size("client", false).expect("size should succeed"), 3);
    assert_eq!(payloads.references_for(PayloadId(4)), 0);
    assert_eq!(
        drops.events(),
        vec![DropEvent::QueueFull {
            queue_id: "client".to_owned(),
            topic: "sensors/metrics".to_owned(),
            shared: false,
        }]
    );
}

/// Scenario:
/// 1. Given three messages in a queue capped at three entries.
/// 2. When a fourth arrives under `discard_oldest`.
/// 3. Then the oldest pending entry gives way, the queue still holds
///    three entries in arrival order, and the notifier fires once.
#[test]
fn discard_oldest_evicts_the_oldest_pending_entry() {
    let TestEngine { engine, payloads, drops } = engine();
    for sequence in 1..=4 {
        let outcome = engine
            .add("client", false, publish(sequence, QosLevel::AtLeastOnce), 3, EvictionPolicy::DiscardOldest, false)
            .expect("admission should succeed");
        assert!(outcome.is_enqueued());
    }

    assert_eq!(engine.size("client", false).expect("size should succeed"), 3);
    assert_eq!(drops.events().len(), 1);
    assert_eq!(payloads.references_for(PayloadId(1)), 0);

    let messages = engine
        .read_new("client", false, &ids(&[1, 2, 3]), u64::MAX, NOW)
        .expect("read should succeed");
    assert_eq!(
        messages
            .iter()
            .map(|message| message.publish.unique_id.0)
            .collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
}

/// Scenario:
/// 1. Given a full queue whose entries are all inflight.
/// 2. When a new message arrives under `discard_oldest`.
/// 3. Then no inflight entry is evicted; the incoming message is dropped
///    instead.
#[test]
fn discard_oldest_never_evicts_inflight_entries() {
    let TestEngine { engine, payloads, drops } = engine();
    for sequence in [1, 2] {
        let _ = engine
            .add("client", false, publish(sequence, QosLevel::AtLeastOnce), 2, EvictionPolicy::DiscardOldest, false)
            .expect("admission should succeed");
    }
    let _ = engine
        .read_new("client", false, &ids(&[1, 2]), u64::MAX, NOW)
        .expect("read should succeed");

    let outcome = engine
        .add("client", false, publish(3, QosLevel::AtLeastOnce), 2, EvictionPolicy::DiscardOldest, false)
        .expect("admission should succeed");
    assert_eq!(outcome, AddOutcome::Dropped(DropReason::QueueFull));
    assert_eq!(engine.size("client", false).expect("size should succeed"), 2);
    assert_eq!(payloads.references_for(PayloadId(1)), 1);
    assert_eq!(payloads.references_for(PayloadId(2)), 1);
    assert_eq!(drops.events().len(), 1);
}

/// Scenario:
/// 1. Given a retained cap of two and an ample non-retained cap.
/// 2. When three retained and one non-retained message arrive.
/// 3. Then the third retained admission is rejected against its own cap
///    while the non-retained message is judged only against the
///    non-retained occupancy.
#[test]
fn retained_entries_count_against_their_own_cap() {
    let TestEngine { engine, .. } = engine_with(QueueConfig {
        retained_queue_size: 2,
        ..QueueConfig::default()
    });
    for sequence in [1, 2] {
        let outcome = engine
            .add("client", false, publish(sequence, QosLevel::AtLeastOnce), 1000, EvictionPolicy::Discard, true)
            .expect("admission should succeed");
        assert!(outcome.is_enqueued());
    }

    let outcome = engine
        .add("client", false, publish(3, QosLevel::AtLeastOnce), 1000, EvictionPolicy::Discard, true)
        .expect("admission should succeed");
    assert_eq!(outcome, AddOutcome::Dropped(DropReason::RetainedQueueFull));

    // Two retained entries stored, yet the non-retained occupancy is zero.
    let outcome = engine
        .add("client", false, publish(4, QosLevel::AtLeastOnce), 1, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert!(outcome.is_enqueued());
    assert_eq!(engine.size("client", false).expect("size should succeed"), 3);
}

/// Scenario:
/// 1. Given a queue holding retained entries and a full non-retained slot.
/// 2. When a non-retained message overflows under `discard_oldest`.
/// 3. Then the evicted entry is the oldest non-retained one; retained
///    entries are never sacrificed for non-retained traffic.
#[test]
fn non_retained_overflow_spares_retained_entries() {
    let TestEngine { engine, payloads, .. } = engine();
    let _ = engine
        .add("client", false, publish(1, QosLevel::AtLeastOnce), 1000, EvictionPolicy::Discard, true)
        .expect("admission should succeed");
    let _ = engine
        .add("client", false, publish(2, QosLevel::AtLeastOnce), 1, EvictionPolicy::DiscardOldest, false)
        .expect("admission should succeed");

    let outcome = engine
        .add("client", false, publish(3, QosLevel::AtLeastOnce), 1, EvictionPolicy::DiscardOldest, false)
        .expect("admission should succeed");
    assert!(outcome.is_enqueued());
    assert_eq!(payloads.references_for(PayloadId(1)), 1, "retained entry survives");
    assert_eq!(payloads.references_for(PayloadId(2)), 0, "oldest non-retained gave way");
    assert_eq!(engine.size("client", false).expect("size should succeed"), 2);
}

/// Scenario:
/// 1. Given an absolute process-wide best-effort ceiling of 250 bytes.
/// 2. When three 100-byte best-effort messages arrive.
/// 3. Then the third is rejected with the ceiling's occupancy and limit,
///    keeping the first two stored.
#[test]
fn qos0_process_ceiling_rejects_the_new_message() {
    let TestEngine { engine, payloads, drops } = engine_with(QueueConfig {
        qos0_memory_bytes: Some(250),
        ..QueueConfig::default()
    });
    for sequence in [1, 2] {
        let outcome = engine
            .add("client", false, publish(sequence, QosLevel::AtMostOnce), 1000, EvictionPolicy::Discard, false)
            .expect("admission should succeed");
        assert!(outcome.is_enqueued());
    }

    let outcome = engine
        .add("client", false, publish(3, QosLevel::AtMostOnce), 1000, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert_eq!(outcome, AddOutcome::Dropped(DropReason::Qos0MemoryExceeded));
    assert_eq!(engine.size("client", false).expect("size should succeed"), 2);
    assert_eq!(payloads.references_for(PayloadId(3)), 0);
    assert_eq!(
        drops.events(),
        vec![DropEvent::Qos0MemoryExceeded {
            queue_id: "client".to_owned(),
            current_bytes: 200,
            limit_bytes: 250,
            shared: false,
        }]
    );
}

/// Scenario:
/// 1. Given a 150-byte per-queue best-effort ceiling.
/// 2. When two 100-byte messages target one client and one targets another.
/// 3. Then the second message to the first client is rejected while the
///    other client's queue is unaffected.
#[test]
fn qos0_queue_ceiling_is_local_to_one_queue() {
    let TestEngine { engine, drops, .. } = engine_with(QueueConfig {
        qos0_queue_memory_bytes: 150,
        ..QueueConfig::default()
    });
    let outcome = engine
        .add("client-a", false, publish(1, QosLevel::AtMostOnce), 1000, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert!(outcome.is_enqueued());
    let outcome = engine
        .add("client-a", false, publish(2, QosLevel::AtMostOnce), 1000, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert_eq!(outcome, AddOutcome::Dropped(DropReason::Qos0QueueMemoryExceeded));

    let outcome = engine
        .add("client-b", false, publish(3, QosLevel::AtMostOnce), 1000, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert!(outcome.is_enqueued());
    assert_eq!(drops.events().len(), 1);
    assert_eq!(engine.qos0_queue_bytes("client-a"), 100);
    assert_eq!(engine.qos0_queue_bytes("client-b"), 100);
}

/// Scenario:
/// 1. Given the same 150-byte per-queue ceiling and a shared group queue.
/// 2. When two 100-byte best-effort messages arrive for the group.
/// 3. Then both are admitted; shared group queues are only bounded by the
///    process-wide ceiling.
#[test]
fn shared_group_queues_skip_the_per_queue_ceiling() {
    let TestEngine { engine, drops, .. } = engine_with(QueueConfig {
        qos0_queue_memory_bytes: 150,
        ..QueueConfig::default()
    });
    for sequence in [1, 2] {
        let outcome = engine
            .add("group", true, publish(sequence, QosLevel::AtMostOnce), 1000, EvictionPolicy::Discard, false)
            .expect("admission should succeed");
        assert!(outcome.is_enqueued());
    }
    assert!(drops.is_empty());
    assert_eq!(engine.size("group", true).expect("size should succeed"), 2);
}

/// Scenario:
/// 1. Given a shared group queue over the process-wide ceiling.
/// 2. When a best-effort message for the group is rejected.
/// 3. Then the shared variant of the notification fires.
#[test]
fn shared_qos0_rejection_uses_the_shared_notification() {
    let TestEngine { engine, drops, .. } = engine_with(QueueConfig {
        qos0_memory_bytes: Some(50),
        ..QueueConfig::default()
    });
    let outcome = engine
        .add("group", true, publish(1, QosLevel::AtMostOnce), 1000, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert_eq!(outcome, AddOutcome::Dropped(DropReason::Qos0MemoryExceeded));
    assert_eq!(
        drops.events(),
        vec![DropEvent::Qos0MemoryExceeded {
            queue_id: "group".to_owned(),
            current_bytes: 0,
            limit_bytes: 50,
            shared: true,
        }]
    );
}

/// Scenario:
/// 1. Given the same five messages offered as one batch and one at a time.
/// 2. When both stores apply a three-entry cap under `discard_oldest`.
/// 3. Then the per-message outcomes and the end states are identical.
#[test]
fn batch_admission_matches_sequential_admission() {
    let batch_engine = engine();
    let sequential_engine = engine();
    let messages: Vec<_> = (1..=5)
        .map(|sequence| publish(sequence, QosLevel::AtLeastOnce))
        .collect();

    let batch_outcomes = batch_engine
        .engine
        .add_batch("client", false, messages.clone(), 3, EvictionPolicy::DiscardOldest, false)
        .expect("batch admission should succeed");
    let sequential_outcomes: Vec<_> = messages
        .into_iter()
        .map(|message| {
            sequential_engine
                .engine
                .add("client", false, message, 3, EvictionPolicy::DiscardOldest, false)
                .expect("admission should succeed")
        })
        .collect();

    assert_eq!(batch_outcomes, sequential_outcomes);
    assert_eq!(
        batch_engine.engine.size("client", false).expect("size should succeed"),
        sequential_engine.engine.size("client", false).expect("size should succeed"),
    );
    assert_eq!(
        batch_engine.engine.total_memory_bytes(),
        sequential_engine.engine.total_memory_bytes()
    );
    assert_eq!(
        batch_engine.payloads.live_references(),
        sequential_engine.payloads.live_references()
    );
}

/// Scenario:
/// 1. Given a batch containing one message with a zero arrival timestamp.
/// 2. When it is offered.
/// 3. Then the whole batch is rejected before any reference is taken.
#[test]
fn zero_arrival_timestamps_fail_validation() {
    let TestEngine { engine, payloads, .. } = engine();
    let mut invalid = publish(1, QosLevel::AtLeastOnce);
    invalid.timestamp = Timestamp(0);

    let result = engine.add_batch(
        "client",
        false,
        vec![publish(2, QosLevel::AtLeastOnce), invalid],
        1000,
        EvictionPolicy::Discard,
        false,
    );
    assert_eq!(
        result,
        Err(QueueEngineError::InvalidTimestamp { queue_id: "client".to_owned() })
    );
    assert_eq!(payloads.live_references(), 0);
    assert_eq!(engine.size("client", false).expect("size should succeed"), 0);
}

/// Scenario:
/// 1. Given one successful admission.
/// 2. When nothing else happens.
/// 3. Then exactly one payload reference is held and the gauges carry the
///    message's estimated size.
#[test]
fn admission_takes_exactly_one_payload_reference() {
    let TestEngine { engine, payloads, .. } = engine();
    let _ = engine
        .add("client", false, publish(1, QosLevel::AtLeastOnce), 1000, EvictionPolicy::Discard, false)
        .expect("admission should succeed");
    assert_eq!(payloads.references_for(PayloadId(1)), 1);
    assert_eq!(engine.total_memory_bytes(), MESSAGE_SIZE);
    assert_eq!(engine.qos0_memory_bytes(), 0);
}
