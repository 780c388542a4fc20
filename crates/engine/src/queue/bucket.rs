// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Queue identity to bucket routing.
//!
//! The queue store is split into a fixed number of buckets, each behind
//! its own lock. Routing hashes only the textual identity, never the
//! shared flag, so a client session and a shared group with the same
//! identity always land in the same bucket. The hash is FNV-1a over the
//! UTF-8 bytes, which keeps the mapping stable across processes and
//! releases; callers may persist bucket-partitioned work schedules.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Maps a queue identity to a bucket index in `0..bucket_count`.
#[must_use]
pub fn bucket_of(queue_id: &str, bucket_count: usize) -> usize {
    debug_assert!(bucket_count > 0, "bucket_count must be non-zero");
    let mut hash = FNV_OFFSET_BASIS;
    for byte in queue_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash % bucket_count as u64) as usize
}
