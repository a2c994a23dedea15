// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream protocol constants.
//!
//! Centralizes the values shared with the receiving side. Both endpoints
//! must be built from the same constants; changing `FRAGMENT_SIZE` or the
//! header layout is a wire-protocol break.

/// Payload bytes carried by one data fragment.
pub const FRAGMENT_SIZE: usize = 1000;

/// Maximum fragments a single frame may be split into.
///
/// Bounded by the 128-bit acknowledge bitmap width.
pub const MAX_FRAGMENTS_PER_FRAME: usize = 128;

/// Maximum accepted frame size, in bytes.
pub const MAX_FRAME_SIZE: usize = FRAGMENT_SIZE * MAX_FRAGMENTS_PER_FRAME;

/// Data packet header length (see [`DataHeader`](super::DataHeader)).
pub const DATA_HEADER_LEN: usize = 7;

/// Ack packet wire length: frame number (u16) + two bitmap halves (u64 each).
pub const ACK_PACKET_LEN: usize = 18;

/// Frame flag bit: this frame was enqueued with the flush flag and
/// preempts the receiver's current frame.
pub const FLAG_FLUSH_FRAME: u8 = 0x01;

/// Minimum time between two retransmission rounds, in milliseconds.
pub const MIN_RETRY_MS: u64 = 15;

/// Maximum time between two retransmission rounds, in milliseconds.
pub const MAX_RETRY_MS: u64 = 50;

/// Latency assumed when the network manager cannot provide an estimate,
/// in milliseconds.
pub const DEFAULT_LATENCY_MS: u64 = 100;

/// Number of frames in the moving efficiency window.
pub const EFFICIENCY_WINDOW: usize = 15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_covers_max_frame() {
        // Every fragment index of a maximum-size frame must fit the bitmap.
        assert!(MAX_FRAME_SIZE.div_ceil(FRAGMENT_SIZE) <= MAX_FRAGMENTS_PER_FRAME);
        // Fragment counts must fit the single-byte header field.
        assert!(MAX_FRAGMENTS_PER_FRAME <= u8::MAX as usize + 1);
    }

    #[test]
    fn test_retry_bounds_ordered() {
        assert!(MIN_RETRY_MS < MAX_RETRY_MS);
        assert!(MAX_RETRY_MS < DEFAULT_LATENCY_MS + 5);
    }
}
