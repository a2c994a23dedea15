// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The frame sender.
//!
//! A [`Sender`] accepts whole video frames from a producer, splits each
//! into fixed-size fragments, transmits them over a [`NetworkManager`],
//! and selectively retransmits fragments the receiver has not
//! acknowledged. Two worker loops drive it:
//!
//! - the **data loop** pops pending frames and (re)transmits fragments;
//! - the **ack loop** merges incoming ack bitmaps and completes frames.
//!
//! Each accepted frame ends in exactly one producer callback:
//! [`FrameStatus::Sent`] once fully acknowledged, or
//! [`FrameStatus::Cancelled`] if it was preempted or flushed.
//!
//! # Threads
//!
//! [`Sender::start`] spawns the two loops on named threads and
//! [`Sender::stop`] + [`Sender::join`] tear them down (both loops observe
//! the stop flag within their wait timeouts, at most one second). For
//! callers that manage threads themselves, [`Sender::run_data_loop`] and
//! [`Sender::run_ack_loop`] are the raw loop entry points.

mod ack_loop;
mod data_loop;
mod queue;
mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::SenderConfig;
use crate::error::{Error, Result};
use crate::transport::NetworkManager;
use crate::wire::MAX_FRAME_SIZE;

use queue::FrameQueue;
use state::SharedState;

pub use state::{FrameStatus, FrameUpdateCallback, SenderStats};

struct LoopHandles {
    data: JoinHandle<()>,
    ack: JoinHandle<()>,
}

/// Reliable fragmented frame sender over a datagram transport.
pub struct Sender {
    shared: Arc<SharedState>,
    queue: Arc<FrameQueue>,
    manager: Arc<dyn NetworkManager>,
    config: SenderConfig,
    threads: Mutex<Option<LoopHandles>>,
}

impl Sender {
    /// Create a sender bound to a transport.
    ///
    /// `callback` receives the final status of every accepted frame, on a
    /// worker thread. It must not call back into the sender.
    pub fn new(
        manager: Arc<dyn NetworkManager>,
        config: SenderConfig,
        callback: FrameUpdateCallback,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(SharedState::new(callback)),
            queue: Arc::new(FrameQueue::new(config.queue_capacity)),
            manager,
            config,
            threads: Mutex::new(None),
        })
    }

    /// Spawn the data and ack loops on dedicated threads.
    ///
    /// Returns [`Error::Busy`] if the loops were already started.
    pub fn start(&self) -> Result<()> {
        let mut threads = self.threads.lock();
        if threads.is_some() {
            return Err(Error::Busy);
        }

        let data = {
            let shared = Arc::clone(&self.shared);
            let queue = Arc::clone(&self.queue);
            let manager = Arc::clone(&self.manager);
            let channel = self.config.data_channel;
            thread::Builder::new()
                .name("framestream-data".into())
                .spawn(move || data_loop::run(&shared, &queue, &manager, channel))
                .map_err(|e| {
                    Error::ResourceExhausted(format!("failed to spawn data loop: {}", e))
                })?
        };

        let ack = {
            let shared = Arc::clone(&self.shared);
            let queue = Arc::clone(&self.queue);
            let manager = Arc::clone(&self.manager);
            let channel = self.config.ack_channel;
            let spawned = thread::Builder::new()
                .name("framestream-ack".into())
                .spawn(move || ack_loop::run(&shared, &queue, manager.as_ref(), channel));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    // Roll back the half-started sender.
                    self.shared.request_stop();
                    let _ = data.join();
                    return Err(Error::ResourceExhausted(format!(
                        "failed to spawn ack loop: {}",
                        e
                    )));
                }
            }
        };

        *threads = Some(LoopHandles { data, ack });
        Ok(())
    }

    /// Request both loops to stop.
    ///
    /// The loops observe the flag at their next wait timeout; there is no
    /// forced termination. Stopping is terminal for this sender.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Wait for both loops to terminate.
    ///
    /// Returns [`Error::Busy`] if called before [`stop`](Self::stop), or
    /// if caller-managed loops are still running.
    pub fn join(&self) -> Result<()> {
        if !self.shared.should_stop() {
            return Err(Error::Busy);
        }
        let handles = self.threads.lock().take();
        match handles {
            Some(handles) => {
                if handles.data.join().is_err() {
                    log::error!("data loop panicked");
                }
                if handles.ack.join().is_err() {
                    log::error!("ack loop panicked");
                }
            }
            None => {
                if self.shared.data_loop_running() || self.shared.ack_loop_running() {
                    return Err(Error::Busy);
                }
            }
        }
        Ok(())
    }

    /// Submit a frame for transmission.
    ///
    /// With `flush` set, every frame still waiting in the queue is
    /// cancelled first and this frame preempts the one in flight.
    ///
    /// On success returns the number of frames that were outstanding
    /// before this one (queued frames, plus the in-flight frame if it has
    /// not completed). The frame will receive exactly one callback. On
    /// error the producer keeps the frame and no callback is issued.
    pub fn send_frame(&self, frame: Bytes, flush: bool) -> Result<usize> {
        if frame.is_empty() {
            return Err(Error::BadParameters("frame must not be empty".into()));
        }
        if frame.len() > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge(frame.len()));
        }
        self.queue
            .enqueue(frame, flush, &self.shared)
            .ok_or(Error::QueueFull)
    }

    /// Transmission efficiency over the recent frame window, in `(0, 1]`.
    ///
    /// The ratio of distinct fragments to actual transmissions: 1.0 means
    /// no retransmission was needed. Returns 1.0 before any transmission.
    pub fn estimated_efficiency(&self) -> f32 {
        let (fragments, sent) = self.shared.ack.lock().efficiency.totals();
        if sent == 0 {
            return 1.0;
        }
        if fragments > sent {
            log::error!(
                "computed efficiency is greater than 1.0 ({} fragments, {} transmissions)",
                fragments,
                sent
            );
            return 1.0;
        }
        fragments as f32 / sent as f32
    }

    /// Snapshot of the transfer counters.
    pub fn stats(&self) -> SenderStats {
        self.shared.snapshot_stats()
    }

    /// Data loop entry point for caller-managed threading.
    ///
    /// Blocks until [`stop`](Self::stop) is observed.
    pub fn run_data_loop(&self) {
        data_loop::run(
            &self.shared,
            &self.queue,
            &self.manager,
            self.config.data_channel,
        );
    }

    /// Ack loop entry point for caller-managed threading.
    ///
    /// Blocks until [`stop`](Self::stop) is observed.
    pub fn run_ack_loop(&self) {
        ack_loop::run(
            &self.shared,
            &self.queue,
            self.manager.as_ref(),
            self.config.ack_channel,
        );
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.stop();
        let _ = self.join();
    }
}
