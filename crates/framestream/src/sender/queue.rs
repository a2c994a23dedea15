// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending-frame queue.
//!
//! A bounded ring of frames waiting for the data loop, with two
//! non-obvious rules:
//!
//! - **Head eligibility** (the ack-gate): the head frame may only be
//!   popped if it is high priority, or the current frame's final callback
//!   has been delivered. A high-priority frame therefore preempts an
//!   unfinished transmission; a low-priority one waits for it.
//! - **Bounded pop wait**: when no eligible frame is available, `pop`
//!   waits on the queue condition for at most the retry interval and then
//!   returns `None`, which is the data loop's cue to retransmit
//!   unacknowledged fragments of the current frame.

use std::time::Instant;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use super::state::{FrameStatus, SharedState};
use crate::transport::NetworkManager;
use crate::wire::constants::{DEFAULT_LATENCY_MS, MAX_RETRY_MS, MIN_RETRY_MS};

/// One frame descriptor, immutable for its lifetime in the sender.
#[derive(Debug, Clone)]
pub(crate) struct PendingFrame {
    /// Monotonic number assigned at enqueue time.
    pub(crate) frame_number: u32,
    /// Producer-owned frame bytes.
    pub(crate) payload: Bytes,
    /// True if the frame was enqueued with the flush flag.
    pub(crate) is_high_priority: bool,
}

impl PendingFrame {
    /// Zeroed descriptor standing in before the first frame is popped.
    pub(crate) fn placeholder() -> Self {
        Self {
            frame_number: 0,
            payload: Bytes::new(),
            is_high_priority: false,
        }
    }
}

struct QueueInner {
    slots: Box<[Option<PendingFrame>]>,
    get_idx: usize,
    add_idx: usize,
    count: usize,
    next_frame_number: u32,
}

impl QueueInner {
    fn advance(&self, idx: usize) -> usize {
        (idx + 1) % self.slots.len()
    }

    /// Pop the head frame if one exists and passes the ack-gate.
    fn take_eligible(&mut self, shared: &SharedState) -> Option<PendingFrame> {
        if self.count == 0 {
            return None;
        }
        let head = self.slots[self.get_idx].as_ref()?;
        let eligible =
            head.is_high_priority || !cfg!(feature = "ack-wait") || shared.cb_was_called();
        if !eligible {
            return None;
        }
        let frame = self.slots[self.get_idx].take();
        self.get_idx = self.advance(self.get_idx);
        self.count -= 1;
        frame
    }
}

/// Bounded ring of pending frames with priority-aware pop.
pub(crate) struct FrameQueue {
    inner: Mutex<QueueInner>,
    frame_ready: Condvar,
}

impl FrameQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            inner: Mutex::new(QueueInner {
                slots: slots.into_boxed_slice(),
                get_idx: 0,
                add_idx: 0,
                count: 0,
                next_frame_number: 0,
            }),
            frame_ready: Condvar::new(),
        }
    }

    /// Enqueue a frame.
    ///
    /// Returns the number of frames outstanding before this one (queued
    /// frames plus the in-flight frame if its callback has not fired), or
    /// `None` if the queue is full -- in which case the producer keeps the
    /// frame and no callback is ever issued for it.
    ///
    /// With `flush` set, every queued frame is cancelled first. The frame
    /// currently in flight is not cancelled here; the data loop does that
    /// when it pops this frame.
    pub(crate) fn enqueue(
        &self,
        payload: Bytes,
        flush: bool,
        shared: &SharedState,
    ) -> Option<usize> {
        let mut inner = self.inner.lock();

        let mut prior = inner.count;
        if !shared.cb_was_called() {
            prior += 1;
        }
        if flush {
            Self::flush_waiting(&mut inner, shared);
        }
        if inner.count == inner.slots.len() {
            return None;
        }

        inner.next_frame_number = inner.next_frame_number.wrapping_add(1);
        let frame_number = inner.next_frame_number;
        let idx = inner.add_idx;
        inner.slots[idx] = Some(PendingFrame {
            frame_number,
            payload,
            is_high_priority: flush,
        });
        inner.add_idx = inner.advance(idx);
        inner.count += 1;
        shared.note_frame_queued();

        self.frame_ready.notify_one();
        Some(prior)
    }

    /// Cancel every queued frame. Caller holds the queue lock.
    fn flush_waiting(inner: &mut QueueInner, shared: &SharedState) {
        while inner.count > 0 {
            if let Some(frame) = inner.slots[inner.get_idx].take() {
                shared.notify_frame(FrameStatus::Cancelled, &frame.payload);
            }
            inner.get_idx = inner.advance(inner.get_idx);
            inner.count -= 1;
        }
    }

    /// Pop the next eligible frame, waiting at most one retry interval.
    ///
    /// The wait bound is `clamp(estimated latency + 5 ms, 15 ms, 50 ms)`,
    /// falling back to 100 ms latency when the transport has no estimate.
    /// Elapsed time is accounted across spurious wakes so the total bound
    /// holds. Returns `None` on timeout.
    pub(crate) fn pop(
        &self,
        shared: &SharedState,
        manager: &dyn NetworkManager,
    ) -> Option<PendingFrame> {
        let mut inner = self.inner.lock();
        if let Some(frame) = inner.take_eligible(shared) {
            return Some(frame);
        }

        let bound = Self::retry_wait_bound(manager);
        let start = Instant::now();
        loop {
            let remaining = match bound.checked_sub(start.elapsed()) {
                Some(r) if !r.is_zero() => r,
                _ => return None,
            };
            let timed_out = self.frame_ready.wait_for(&mut inner, remaining).timed_out();
            if let Some(frame) = inner.take_eligible(shared) {
                return Some(frame);
            }
            if timed_out {
                return None;
            }
        }
    }

    /// Wake a parked `pop` so it can re-evaluate eligibility. Called after
    /// the current frame's callback fires.
    pub(crate) fn signal(&self) {
        let _guard = self.inner.lock();
        self.frame_ready.notify_one();
    }

    fn retry_wait_bound(manager: &dyn NetworkManager) -> std::time::Duration {
        if !cfg!(feature = "retries") {
            // Effectively no retries: wait long enough that only a queue
            // signal wakes the pop.
            return std::time::Duration::from_secs(100);
        }
        let latency_ms = manager
            .estimated_latency()
            .map_or(DEFAULT_LATENCY_MS, |d| d.as_millis() as u64);
        // Pad the estimate to avoid an optimistic or zero wait.
        std::time::Duration::from_millis((latency_ms + 5).clamp(MIN_RETRY_MS, MAX_RETRY_MS))
    }
}
