// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the queue engine.

use thiserror::Error;

/// Errors returned by queue engine operations.
///
/// Capacity pressure is never an error: full queues and exceeded memory
/// ceilings are reported through [`AddOutcome`](crate::queue::AddOutcome)
/// and the drop notifier. The variants below all indicate a caller bug or
/// a rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueEngineError {
    /// An admission carried a zero arrival timestamp.
    #[error("invalid arrival timestamp for queue `{queue_id}`: expected non-zero epoch milliseconds")]
    InvalidTimestamp {
        /// Identity of the queue the admission was aimed at.
        queue_id: String,
    },

    /// An explicitly addressed bucket does not exist.
    #[error("bucket index {index} out of range: {bucket_count} buckets configured")]
    BucketIndexOutOfRange {
        /// The offending bucket index.
        index: usize,
        /// Number of buckets the engine was built with.
        bucket_count: usize,
    },

    /// The engine was handed a configuration that fails validation.
    #[error("invalid queue configuration: {reason}")]
    InvalidConfig {
        /// Joined validation messages.
        reason: String,
    },
}
