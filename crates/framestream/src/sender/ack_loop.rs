// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Acknowledgement loop.
//!
//! Blocks in the transport's timed read for ack packets and merges each
//! one into the current frame's bitmap. When the bitmap covers every
//! fragment, the frame is complete: the producer gets `FrameStatus::Sent`
//! and the queue condition is signalled so a gated data loop can advance.
//!
//! Acks for any frame other than the current one are dropped silently --
//! they belong to a frame that was already completed or preempted.

use std::time::Duration;

use super::queue::FrameQueue;
use super::state::{FrameStatus, SharedState};
use crate::transport::{ChannelId, NetworkManager, RecvError};
use crate::wire::{AckPacket, ACK_PACKET_LEN};

/// Read timeout: also the upper bound on stop-flag latency for this loop.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the acknowledgement loop until the stop flag is observed.
pub(crate) fn run(
    shared: &SharedState,
    queue: &FrameQueue,
    manager: &dyn NetworkManager,
    ack_channel: ChannelId,
) {
    let mut buf = [0u8; ACK_PACKET_LEN];

    log::debug!("ack loop running");
    shared.set_ack_loop_running(true);

    while !shared.should_stop() {
        match manager.read_with_timeout(ack_channel, &mut buf, READ_TIMEOUT) {
            Err(RecvError::TimedOut) | Err(RecvError::Empty) => {}
            Err(e) => {
                log::error!("error while reading ack data: {}", e);
            }
            Ok(size) if size != ACK_PACKET_LEN => {
                log::error!("read {} bytes, expected {}", size, ACK_PACKET_LEN);
            }
            Ok(_) => {
                let Some(packet) = AckPacket::decode(&buf) else {
                    continue;
                };
                merge_ack(shared, queue, &packet);
            }
        }
    }

    log::debug!("ack loop ended");
    shared.set_ack_loop_running(false);
}

/// Merge one ack packet into the current frame state.
fn merge_ack(shared: &SharedState, queue: &FrameQueue, packet: &AckPacket) {
    let mut ack = shared.ack.lock();

    // The wire carries a truncated frame number; compare at that width.
    if ack.bitmap.frame_number() as u16 != packet.frame_number {
        shared.note_stale_ack();
        log::debug!(
            "dropping ack for frame {} (current frame {})",
            packet.frame_number,
            ack.bitmap.frame_number()
        );
        return;
    }

    ack.bitmap
        .or_halves(packet.high_packets_ack, packet.low_packets_ack);

    if !shared.cb_was_called() && ack.bitmap.all_set(ack.nb_fragments) {
        log::debug!("frame {} fully acknowledged", ack.current.frame_number);
        // Callback before the gate flag: the data loop must not select the
        // next low-priority frame until the producer has been notified.
        shared.notify_frame(FrameStatus::Sent, &ack.current.payload);
        shared.set_cb_was_called(true);
        queue.signal();
    }
}
