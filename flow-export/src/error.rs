// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error kinds surfaced at the fallible boundaries of flow accounting and export.

use thiserror::Error;

/// Errors the flow accounting and export core can encounter.
///
/// Propagation policy: the fast path never surfaces these to the dataplane — every
/// variant reaching it becomes a `metrics::counter!` increment instead. The slow path
/// logs via `tracing::warn!` and continues, except
/// [`FlowExportError::EncodeBufferTooSmall`], which indicates a programming-invariant
/// violation (the encoder is always handed a fixed 45-octet buffer) rather than
/// recoverable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlowExportError {
    /// The header presented to the key builder was not a well-formed IPv4 header.
    #[error("malformed ipv4 header: {reason}")]
    MalformedHeader {
        /// Human-readable reason the header was rejected.
        reason: &'static str,
    },

    /// The flow table is at its configured capacity; the packet was not accounted.
    #[error("flow table is at capacity ({capacity} entries)")]
    TableFull {
        /// The table's configured capacity.
        capacity: usize,
    },

    /// The caller handed the encoder a buffer too small for a fixed-width data
    /// record. Unreachable by construction: every call site allocates a buffer sized
    /// to [`crate::template::RECORD_LEN`].
    #[error("encode buffer too small: need {need}, have {have}")]
    EncodeBufferTooSmall {
        /// Bytes required.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The egress sink could not accept a datagram on this attempt.
    #[error("collector did not accept the datagram (attempt {attempt} of {max_attempts})")]
    TransmitBackpressure {
        /// Which retry attempt this was, starting at 1.
        attempt: u8,
        /// The configured retry ceiling.
        max_attempts: u8,
    },
}
