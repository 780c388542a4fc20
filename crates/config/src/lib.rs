// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration model shared by the dataplane crates.
//!
//! This crate carries the declarative settings consumed by the runtime
//! engines together with the validated name types (topics, shared
//! subscription groups) that appear throughout the broker surface. All
//! structures deserialize from YAML with serde and publish a JSON schema
//! through schemars.

pub mod queue;
pub mod topic;

pub use topic::TopicName;
