// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Runtime engines for the MQTT dataplane.
//!
//! The crate currently hosts the client queue engine: the per-session and
//! per-shared-group message stores a broker consults between accepting a
//! PUBLISH and completing its delivery. Engines are self-contained and
//! synchronous; the surrounding broker owns scheduling, wire handling, and
//! durability decisions.

pub mod queue;
