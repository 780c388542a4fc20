// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! In-memory client queue backend.
//!
//! Design notes:
//! - One `parking_lot::Mutex` per bucket guards a plain `HashMap` of
//!   queues; operations run to completion inside the lock, collaborator
//!   callbacks included, so per-bucket effects are linearized.
//! - Each queue keeps acknowledged-delivery traffic and best-effort
//!   traffic in separate sub-queues. `read_new` alternates between them,
//!   acknowledged head first, and drains whichever class remains.
//! - Payload bytes live outside the engine; entries carry handles and the
//!   engine mirrors every store/retire into the payload store's reference
//!   counts and the byte gauges.
//!
//! Two-phase completion:
//! - Settling the publish phase of an exactly-once delivery converts the
//!   inflight entry into a zero-sized completion marker in place. The
//!   payload reference is returned at conversion time, while the marker
//!   keeps the entry's queue position, delivery identifier, expiry, and
//!   retained classification until the final acknowledgement removes it.
//! - A completion request that matches nothing records a fresh marker at
//!   the queue front, so the final acknowledgement can be answered even
//!   after identifiers were handed out anew.
//!
//! Expiry:
//! - No timers. `read_new` skips expired entries in place; `clean_up`
//!   physically reclaims them, subject to the inflight protection gates,
//!   and forgets queues the sweep emptied.

mod accounting;
mod persistence;
mod queue_state;

pub use persistence::InMemoryQueuePersistence;

#[cfg(test)]
mod tests;
