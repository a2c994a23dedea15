// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sender configuration.

use crate::error::{Error, Result};
use crate::transport::ChannelId;

/// Sender configuration.
///
/// Channel ids name the transport channels the sender uses: one for
/// outgoing data fragments, one for incoming acks. They must match the
/// channels the [`NetworkManager`](crate::NetworkManager) was set up with.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Transport channel carrying data fragments to the receiver.
    pub data_channel: ChannelId,
    /// Transport channel carrying ack packets back from the receiver.
    pub ack_channel: ChannelId,
    /// Capacity of the pending-frame queue.
    pub queue_capacity: usize,
}

impl SenderConfig {
    /// Config with explicit channel ids and the default queue capacity.
    #[must_use]
    pub fn with_channels(data_channel: ChannelId, ack_channel: ChannelId) -> Self {
        Self {
            data_channel,
            ack_channel,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::BadParameters("queue capacity must be non-zero".into()));
        }
        if self.data_channel == self.ack_channel {
            return Err(Error::BadParameters(
                "data and ack channels must differ".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            data_channel: 0,
            ack_channel: 1,
            queue_capacity: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = SenderConfig {
            queue_capacity: 0,
            ..SenderConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::BadParameters(_))));
    }

    #[test]
    fn test_same_channels_rejected() {
        let config = SenderConfig::with_channels(3, 3);
        assert!(matches!(config.validate(), Err(Error::BadParameters(_))));
    }
}
