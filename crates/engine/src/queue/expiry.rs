// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Message expiry checks.
//!
//! The engine holds no timers. Expiry is evaluated lazily against the
//! timestamp the caller passes into `read_new` and `clean_up`, so a
//! message past its deadline may still occupy memory until one of those
//! operations visits it.

use crate::queue::types::Timestamp;

/// Whether a deadline has elapsed at `now`.
///
/// Entries without a deadline never expire.
#[must_use]
pub fn is_expired(deadline: Option<Timestamp>, now: Timestamp) -> bool {
    deadline.is_some_and(|deadline| deadline <= now)
}
