// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire formats shared with the receiving side.
//!
//! Two packet kinds travel between sender and receiver:
//!
//! - **Data packets** (sender -> receiver): a 7-byte [`DataHeader`]
//!   followed by up to [`FRAGMENT_SIZE`] payload bytes.
//! - **Ack packets** (receiver -> sender): an 18-byte [`AckPacket`]
//!   carrying a 128-bit fragment bitmap.
//!
//! All multi-byte fields are network byte order.

mod bitmap;
pub mod constants;
mod header;

pub use bitmap::{AckPacket, FragmentBitmap};
pub use constants::{
    ACK_PACKET_LEN, DATA_HEADER_LEN, DEFAULT_LATENCY_MS, EFFICIENCY_WINDOW, FLAG_FLUSH_FRAME,
    FRAGMENT_SIZE, MAX_FRAGMENTS_PER_FRAME, MAX_FRAME_SIZE, MAX_RETRY_MS, MIN_RETRY_MS,
};
pub use header::DataHeader;
