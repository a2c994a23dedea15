// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP-backed network manager for development and testing.
//!
//! One plain `std::net::UdpSocket` per channel, no send queue: a packet is
//! either handed to the kernel (completion `Sent`, delivered synchronously)
//! or fails. Latency is reported as unknown, so the sender falls back to
//! its default retry pacing. Production deployments plug in their own
//! [`NetworkManager`] with real queueing and latency estimation.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use parking_lot::RwLock;

use super::{ChannelId, NetworkManager, RecvError, SendStatus, SendTicket};
use crate::error::{Error, Result};

struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
}

/// Development [`NetworkManager`] over plain UDP sockets.
pub struct UdpManager {
    channels: RwLock<HashMap<ChannelId, UdpChannel>>,
}

impl UdpManager {
    /// Create a manager with no channels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a socket for `channel` and associate it with `peer`.
    pub fn open_channel(
        &self,
        channel: ChannelId,
        bind: SocketAddr,
        peer: SocketAddr,
    ) -> Result<()> {
        let socket = UdpSocket::bind(bind)?;
        let mut channels = self.channels.write();
        if channels.contains_key(&channel) {
            return Err(Error::BadParameters(format!(
                "channel {} is already open",
                channel
            )));
        }
        channels.insert(channel, UdpChannel { socket, peer });
        Ok(())
    }

    /// Local address of an open channel (useful with port 0 binds).
    pub fn local_addr(&self, channel: ChannelId) -> Result<SocketAddr> {
        let channels = self.channels.read();
        let ch = channels
            .get(&channel)
            .ok_or_else(|| Error::BadParameters(format!("unknown channel {}", channel)))?;
        Ok(ch.socket.local_addr()?)
    }
}

impl Default for UdpManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkManager for UdpManager {
    fn send_data(&self, channel: ChannelId, packet: &[u8], ticket: SendTicket) -> Result<()> {
        let channels = self.channels.read();
        let ch = channels
            .get(&channel)
            .ok_or_else(|| Error::BadParameters(format!("unknown channel {}", channel)))?;
        match ch.socket.send_to(packet, ch.peer) {
            Ok(_) => {
                ticket.complete(SendStatus::Sent);
                Ok(())
            }
            Err(e) => {
                ticket.complete(SendStatus::Cancelled);
                Err(Error::Io(e))
            }
        }
    }

    fn read_with_timeout(
        &self,
        channel: ChannelId,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, RecvError> {
        let channels = self.channels.read();
        let ch = channels.get(&channel).ok_or(RecvError::Closed)?;
        ch.socket
            .set_read_timeout(Some(timeout))
            .map_err(RecvError::Io)?;
        match ch.socket.recv(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(RecvError::TimedOut)
            }
            Err(e) => Err(RecvError::Io(e)),
        }
    }

    fn estimated_latency(&self) -> Option<Duration> {
        None
    }

    fn flush_channel(&self, _channel: ChannelId) {
        // No send queue: every packet is handed to the kernel immediately,
        // so there is nothing to drop.
    }
}
