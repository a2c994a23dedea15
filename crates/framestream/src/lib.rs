// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # framestream - reliable fragmented video-frame sender
//!
//! A low-latency sender for whole application-level frames (e.g. video
//! frames) over a datagram transport. Each frame is split into fixed-size
//! fragments; the receiver acknowledges fragments through a 128-bit
//! bitmap, and only unacknowledged fragments are retransmitted. A
//! high-priority frame can preempt the transmission in flight.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bytes::Bytes;
//! use framestream::{FrameStatus, Sender, SenderConfig};
//!
//! let manager = my_network_manager(); // Arc<dyn framestream::NetworkManager>
//! let sender = Sender::new(
//!     manager,
//!     SenderConfig::default(),
//!     Box::new(|status, frame| match status {
//!         FrameStatus::Sent => println!("frame of {} bytes delivered", frame.len()),
//!         FrameStatus::Cancelled => println!("frame dropped"),
//!     }),
//! )?;
//! sender.start()?;
//!
//! // An I-frame preempts whatever is still in flight.
//! sender.send_frame(Bytes::from(encoded_frame), /* flush */ true)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                          Producer threads                          |
//! |                    send_frame(frame, flush)                        |
//! +--------------------------------------------------------------------+
//! |                           FrameQueue                               |
//! |     bounded ring | priority-aware pop | ack-gate | flush           |
//! +--------------------------------------------------------------------+
//! |        Data loop                 |            Ack loop             |
//! |  fragment + transmit + retry     |   merge ack bitmaps, complete   |
//! +--------------------------------------------------------------------+
//! |                     NetworkManager (trait)                         |
//! |   datagram send + completion | timed read | latency estimate       |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Sender`] | The sender: lifecycle, frame submission, efficiency |
//! | [`SenderConfig`] | Channel ids and queue capacity |
//! | [`NetworkManager`] | Transport capability the sender runs over |
//! | [`FrameStatus`] | Final per-frame outcome (`Sent` / `Cancelled`) |
//! | [`FragmentBitmap`] | 128-bit per-fragment state, shared wire layout |
//!
//! ## Guarantees
//!
//! - Every accepted frame receives exactly one final callback.
//! - Frame numbers are strictly monotonic.
//! - Acks for any frame but the current one are dropped silently.
//! - A flush-enqueue cancels every queued frame before the new frame is
//!   accepted, and the data loop cancels the in-flight frame when it
//!   advances.

/// Sender configuration.
pub mod config;
/// Error type and result alias.
pub mod error;
/// The sender: queue, worker loops, public API.
pub mod sender;
/// Datagram transport seam and the UDP development manager.
pub mod transport;
/// Wire formats shared with the receiver.
pub mod wire;

pub use config::SenderConfig;
pub use error::{Error, Result};
pub use sender::{FrameStatus, FrameUpdateCallback, Sender, SenderStats};
pub use transport::{
    udp::UdpManager, ChannelId, CompletionSink, NetworkManager, RecvError, SendStatus, SendTicket,
};
pub use wire::{AckPacket, DataHeader, FragmentBitmap};
