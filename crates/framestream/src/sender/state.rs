// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared sender state.
//!
//! One [`SharedState`] is shared by the producer threads, the data loop,
//! the ack loop and the transport's completion callbacks.
//!
//! # Lock order
//!
//! `to_send` -> `ack` -> queue mutex. A thread never acquires an earlier
//! lock while holding a later one, with one documented exception: while
//! installing a new current frame the data loop holds `ack` and takes
//! `to_send` for a single statement. That cannot deadlock because the
//! only other takers of `to_send` (completion callbacks) never touch
//! `ack`, and the only other taker of `ack` (the ack loop) never touches
//! `to_send`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use super::queue::PendingFrame;
use crate::transport::{CompletionSink, SendStatus};
use crate::wire::{FragmentBitmap, EFFICIENCY_WINDOW};

/// Final outcome of one submitted frame, delivered to the producer
/// callback exactly once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Every fragment of the frame was acknowledged by the receiver.
    Sent,
    /// The frame was dropped: preempted by a flush, or flushed out of the
    /// pending queue.
    Cancelled,
}

/// Producer callback invoked on a worker thread when a frame reaches its
/// final status. The frame buffer is handed back with the status; the
/// sender does not touch it afterwards.
///
/// The callback runs with internal sender locks held: it must return
/// promptly and must not call back into the [`Sender`](super::Sender).
pub type FrameUpdateCallback = Box<dyn Fn(FrameStatus, &Bytes) + Send + Sync>;

/// Moving per-frame efficiency window.
///
/// At each frame advance the data loop commits the totals of the frame
/// that just left: how many fragments it had and how many transmissions
/// it actually took. Readers see a stable snapshot under the `ack` lock.
#[derive(Debug)]
pub(crate) struct EfficiencyWindow {
    fragments: [u32; EFFICIENCY_WINDOW],
    sent: [u32; EFFICIENCY_WINDOW],
    index: usize,
}

impl EfficiencyWindow {
    pub(crate) fn new() -> Self {
        Self {
            fragments: [0; EFFICIENCY_WINDOW],
            sent: [0; EFFICIENCY_WINDOW],
            index: 0,
        }
    }

    /// Record the totals of the frame that just left and open a zeroed
    /// slot for the next one.
    pub(crate) fn commit_frame(&mut self, fragments: u32, sent: u32) {
        self.fragments[self.index] = fragments;
        self.sent[self.index] = sent;
        self.index = (self.index + 1) % EFFICIENCY_WINDOW;
        self.fragments[self.index] = 0;
        self.sent[self.index] = 0;
    }

    /// Window totals: (fragments, transmissions).
    pub(crate) fn totals(&self) -> (u64, u64) {
        let fragments = self.fragments.iter().map(|&v| u64::from(v)).sum();
        let sent = self.sent.iter().map(|&v| u64::from(v)).sum();
        (fragments, sent)
    }
}

/// State guarded by the `ack` mutex: the frame currently in flight, its
/// acknowledge bitmap and the efficiency window.
pub(crate) struct AckState {
    /// Frame being transmitted (zeroed placeholder before the first pop).
    pub(crate) current: PendingFrame,
    /// Total fragments of the current frame.
    pub(crate) nb_fragments: usize,
    /// Fragments the receiver has acknowledged for the current frame.
    pub(crate) bitmap: FragmentBitmap,
    pub(crate) efficiency: EfficiencyWindow,
}

/// Counters exposed through [`SenderStats`].
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    frames_queued: AtomicU64,
    frames_sent: AtomicU64,
    frames_cancelled: AtomicU64,
    fragments_sent: AtomicU64,
    retransmits: AtomicU64,
    stale_acks: AtomicU64,
}

/// Snapshot of the sender's transfer counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SenderStats {
    /// Frames accepted into the pending queue.
    pub frames_queued: u64,
    /// Frames fully acknowledged by the receiver.
    pub frames_sent: u64,
    /// Frames dropped before full acknowledgement.
    pub frames_cancelled: u64,
    /// Fragment transmissions handed to the transport (retries included).
    pub fragments_sent: u64,
    /// Fragment transmissions beyond the first round of each frame.
    pub retransmits: u64,
    /// Ack packets dropped because they referred to a stale frame.
    pub stale_acks: u64,
}

/// Shared state of one sender instance.
pub(crate) struct SharedState {
    pub(crate) callback: FrameUpdateCallback,
    pub(crate) ack: Mutex<AckState>,
    /// Fragments handed to the transport but not yet confirmed sent.
    pub(crate) to_send: Mutex<FragmentBitmap>,
    /// True once the current frame's final callback has been delivered.
    /// Starts true: before the first pop there is nothing outstanding.
    cb_was_called: AtomicBool,
    stop: AtomicBool,
    data_loop_running: AtomicBool,
    ack_loop_running: AtomicBool,
    pub(crate) stats: StatCounters,
}

impl SharedState {
    pub(crate) fn new(callback: FrameUpdateCallback) -> Self {
        Self {
            callback,
            ack: Mutex::new(AckState {
                current: PendingFrame::placeholder(),
                nb_fragments: 0,
                bitmap: FragmentBitmap::new(),
                efficiency: EfficiencyWindow::new(),
            }),
            to_send: Mutex::new(FragmentBitmap::new()),
            cb_was_called: AtomicBool::new(true),
            stop: AtomicBool::new(false),
            data_loop_running: AtomicBool::new(false),
            ack_loop_running: AtomicBool::new(false),
            stats: StatCounters::default(),
        }
    }

    pub(crate) fn cb_was_called(&self) -> bool {
        self.cb_was_called.load(Ordering::Acquire)
    }

    pub(crate) fn set_cb_was_called(&self, value: bool) {
        self.cb_was_called.store(value, Ordering::Release);
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub(crate) fn set_data_loop_running(&self, value: bool) {
        self.data_loop_running.store(value, Ordering::Release);
    }

    pub(crate) fn set_ack_loop_running(&self, value: bool) {
        self.ack_loop_running.store(value, Ordering::Release);
    }

    pub(crate) fn data_loop_running(&self) -> bool {
        self.data_loop_running.load(Ordering::Acquire)
    }

    pub(crate) fn ack_loop_running(&self) -> bool {
        self.ack_loop_running.load(Ordering::Acquire)
    }

    /// Deliver a final frame status to the producer and count it.
    pub(crate) fn notify_frame(&self, status: FrameStatus, payload: &Bytes) {
        match status {
            FrameStatus::Sent => self.stats.frames_sent.fetch_add(1, Ordering::Relaxed),
            FrameStatus::Cancelled => self.stats.frames_cancelled.fetch_add(1, Ordering::Relaxed),
        };
        (self.callback)(status, payload);
    }

    pub(crate) fn note_frame_queued(&self) {
        self.stats.frames_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_fragment_sent(&self, retransmit: bool) {
        self.stats.fragments_sent.fetch_add(1, Ordering::Relaxed);
        if retransmit {
            self.stats.retransmits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn note_stale_ack(&self) {
        self.stats.stale_acks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot_stats(&self) -> SenderStats {
        SenderStats {
            frames_queued: self.stats.frames_queued.load(Ordering::Relaxed),
            frames_sent: self.stats.frames_sent.load(Ordering::Relaxed),
            frames_cancelled: self.stats.frames_cancelled.load(Ordering::Relaxed),
            fragments_sent: self.stats.fragments_sent.load(Ordering::Relaxed),
            retransmits: self.stats.retransmits.load(Ordering::Relaxed),
            stale_acks: self.stats.stale_acks.load(Ordering::Relaxed),
        }
    }
}

impl CompletionSink for SharedState {
    /// Per-fragment send completion, invoked by the transport.
    ///
    /// Takes only the `to_send` lock, so a transport may deliver it
    /// synchronously from inside `send_data` while the data loop holds
    /// `ack`.
    fn on_send_complete(&self, frame_number: u32, fragment_index: u8, status: SendStatus) {
        if status != SendStatus::Sent {
            return;
        }
        let mut to_send = self.to_send.lock();
        if to_send.frame_number() != frame_number {
            log::debug!(
                "sent a fragment of an old frame [frame {}, current frame {}]",
                frame_number,
                to_send.frame_number()
            );
            return;
        }
        log::trace!("sent fragment {} of frame {}", fragment_index, frame_number);
        if to_send.clear(usize::from(fragment_index)) {
            log::debug!("all fragments of frame {} were sent", frame_number);
        }
    }
}
