// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transmit loop.
//!
//! Each iteration tries to advance to the next pending frame, then sends
//! every fragment of the current frame that is neither acknowledged nor
//! already confirmed sent. A pop timeout (no eligible frame within one
//! retry interval) falls through to the send phase, which is what makes
//! it a retransmission round.

use std::sync::Arc;

use super::queue::FrameQueue;
use super::state::{FrameStatus, SharedState};
use crate::transport::{ChannelId, NetworkManager, SendTicket};
use crate::wire::{DataHeader, DATA_HEADER_LEN, FRAGMENT_SIZE};

/// Run the transmit loop until the stop flag is observed.
pub(crate) fn run(
    shared: &Arc<SharedState>,
    queue: &FrameQueue,
    manager: &Arc<dyn NetworkManager>,
    data_channel: ChannelId,
) {
    let mut packet = [0u8; DATA_HEADER_LEN + FRAGMENT_SIZE];
    // Fragment geometry of the current frame; live across iterations so
    // retransmission rounds can rebuild fragments after the pop timed out.
    let mut nb_packets = 0usize;
    let mut last_fragment_size = 0usize;
    let mut sent_for_current = 0u32;

    log::debug!("data loop running");
    shared.set_data_loop_running(true);

    while !shared.should_stop() {
        let popped = queue.pop(shared, manager.as_ref());
        let advanced = popped.is_some();

        let mut ack = shared.ack.lock();
        if let Some(next) = popped {
            log::debug!(
                "previous frame took {} transmissions for {} fragments",
                sent_for_current,
                nb_packets
            );
            ack.efficiency.commit_frame(nb_packets as u32, sent_for_current);
            sent_for_current = 0;

            // The frame being replaced never completed: drop whatever the
            // transport still queues for it and hand it back cancelled.
            if !shared.cb_was_called() {
                log::debug!(
                    "cancelling frame {} ({}/{} fragments acknowledged)",
                    ack.current.frame_number,
                    ack.bitmap.count_set(ack.nb_fragments),
                    ack.nb_fragments
                );
                manager.flush_channel(data_channel);
                shared.notify_frame(FrameStatus::Cancelled, &ack.current.payload);
            }
            shared.set_cb_was_called(false);

            ack.current = next;
            let frame_number = ack.current.frame_number;
            ack.bitmap.reset(frame_number);
            shared.to_send.lock().reset(frame_number);

            let size = ack.current.payload.len();
            last_fragment_size = FRAGMENT_SIZE;
            nb_packets = size / FRAGMENT_SIZE;
            if size % FRAGMENT_SIZE != 0 {
                nb_packets += 1;
                last_fragment_size = size % FRAGMENT_SIZE;
            }
            ack.nb_fragments = nb_packets;
            log::debug!(
                "new frame {} has {} bytes ({} fragments)",
                frame_number,
                size,
                nb_packets
            );
        }
        drop(ack);

        // Flag every unacknowledged fragment as "to send", then transmit
        // them. The to_send lock is released across each send_data call:
        // the completion callback takes it and may run synchronously.
        let mut to_send = shared.to_send.lock();
        let ack = shared.ack.lock();
        to_send.clear_all();
        for i in 0..nb_packets {
            if !ack.bitmap.is_set(i) {
                to_send.set(i);
            }
        }

        let frame_number = to_send.frame_number();
        let mut index = 0usize;
        while index < nb_packets {
            if !to_send.is_set(index) {
                index += 1;
                continue;
            }
            sent_for_current += 1;
            shared.note_fragment_sent(!advanced);

            let frag_size = if index == nb_packets - 1 {
                last_fragment_size
            } else {
                FRAGMENT_SIZE
            };
            let header = DataHeader::new(
                frame_number,
                ack.current.is_high_priority,
                index as u8,
                nb_packets as u8,
            );
            let Some(header_len) = header.encode_to(&mut packet) else {
                index += 1;
                continue;
            };
            let offset = index * FRAGMENT_SIZE;
            packet[header_len..header_len + frag_size]
                .copy_from_slice(&ack.current.payload[offset..offset + frag_size]);

            let ticket = SendTicket::new(shared.clone(), frame_number, index as u8);
            drop(to_send);
            if let Err(e) =
                manager.send_data(data_channel, &packet[..header_len + frag_size], ticket)
            {
                log::warn!("failed to hand fragment {} to the transport: {}", index, e);
            }
            to_send = shared.to_send.lock();
            index += 1;
        }
        drop(ack);
        drop(to_send);
    }

    log::debug!("data loop ended");
    shared.set_data_loop_running(false);
}
