// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram transport seam.
//!
//! The sender does not own sockets. It talks to a [`NetworkManager`]: a
//! datagram-oriented transport that accepts whole packets for sending,
//! reports per-packet completion, and offers a blocking read with timeout
//! for the ack channel. Queueing, packet-level retries and latency
//! estimation all live behind this trait.
//!
//! # Completion tickets
//!
//! Each `send_data` call receives a [`SendTicket`] identifying the
//! fragment being sent. The transport must eventually either call
//! [`SendTicket::complete`] with the final [`SendStatus`] or drop the
//! ticket (treated as "no action"). `complete` consumes the ticket, so a
//! completion can be delivered at most once per send.
//!
//! # Implementations
//!
//! - [`UdpManager`](crate::transport::udp::UdpManager) - plain UDP sockets
//!   for development and testing
//! - test mocks implementing the trait directly

pub mod udp;

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Identifier of a transport channel within a [`NetworkManager`].
pub type ChannelId = u8;

/// Final status of one `send_data` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The packet left the transport.
    Sent,
    /// The packet was dropped before leaving (e.g. channel flushed).
    Cancelled,
}

/// Error from [`NetworkManager::read_with_timeout`].
///
/// `TimedOut` and `Empty` are expected idle outcomes and handled silently
/// by the ack loop; the other variants are logged.
#[derive(Debug)]
pub enum RecvError {
    /// No packet arrived within the timeout.
    TimedOut,
    /// The channel had no buffered data.
    Empty,
    /// The channel is closed and will not produce further packets.
    Closed,
    /// Underlying I/O failure.
    Io(std::io::Error),
}

impl std::fmt::Display for RecvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvError::TimedOut => write!(f, "read timed out"),
            RecvError::Empty => write!(f, "channel empty"),
            RecvError::Closed => write!(f, "channel closed"),
            RecvError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for RecvError {}

/// Receiver of per-send completions.
///
/// Implemented by the sender's shared state; transports only see it
/// through [`SendTicket`].
pub trait CompletionSink: Send + Sync {
    /// Deliver the final status of one fragment send.
    fn on_send_complete(&self, frame_number: u32, fragment_index: u8, status: SendStatus);
}

/// Per-send completion parameter.
///
/// Identifies the fragment a `send_data` call carried and routes the
/// transport's completion back into the sender. Consuming semantics:
/// [`complete`](Self::complete) takes the ticket by value, so the
/// completion fires exactly once; dropping the ticket without completing
/// it is the "no action" case and leaves the sender state untouched.
pub struct SendTicket {
    sink: Arc<dyn CompletionSink>,
    frame_number: u32,
    fragment_index: u8,
}

impl SendTicket {
    /// Create a ticket for one fragment of one frame.
    #[must_use]
    pub fn new(sink: Arc<dyn CompletionSink>, frame_number: u32, fragment_index: u8) -> Self {
        Self {
            sink,
            frame_number,
            fragment_index,
        }
    }

    /// Frame this send belongs to.
    #[must_use]
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Fragment index this send carries.
    #[must_use]
    pub fn fragment_index(&self) -> u8 {
        self.fragment_index
    }

    /// Deliver the final send status. Consumes the ticket.
    pub fn complete(self, status: SendStatus) {
        self.sink
            .on_send_complete(self.frame_number, self.fragment_index, status);
    }
}

impl std::fmt::Debug for SendTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendTicket")
            .field("frame_number", &self.frame_number)
            .field("fragment_index", &self.fragment_index)
            .finish()
    }
}

/// Datagram transport capability required by the sender.
///
/// Implementations must be callable from multiple threads: the data loop
/// sends fragments while producer threads may be enqueueing and the ack
/// loop is blocked in `read_with_timeout`.
pub trait NetworkManager: Send + Sync {
    /// Hand one packet to the transport for sending on `channel`.
    ///
    /// The packet bytes are only borrowed for the duration of the call;
    /// the transport must copy what it keeps. The `ticket` must be
    /// completed (or dropped) once the packet's fate is known. A
    /// completion may be delivered synchronously, from inside this call.
    fn send_data(&self, channel: ChannelId, packet: &[u8], ticket: SendTicket) -> Result<()>;

    /// Blocking read of the next packet on `channel`, bounded by `timeout`.
    ///
    /// Returns the packet length on success.
    fn read_with_timeout(
        &self,
        channel: ChannelId,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, RecvError>;

    /// Current estimate of the one-way network latency, if known.
    fn estimated_latency(&self) -> Option<Duration>;

    /// Drop every packet still queued for sending on `channel`.
    ///
    /// Pending sends complete with [`SendStatus::Cancelled`].
    fn flush_channel(&self, channel: ChannelId);
}
