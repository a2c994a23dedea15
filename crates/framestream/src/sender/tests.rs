// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end sender tests over a scripted transport.
//!
//! The mock manager records every packet handed to it, completes sends
//! synchronously, and feeds ack packets injected by the test through the
//! ack channel read.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

use super::{FrameStatus, FrameUpdateCallback, Sender};
use crate::config::SenderConfig;
use crate::transport::{ChannelId, NetworkManager, RecvError, SendStatus, SendTicket};
use crate::wire::{AckPacket, DataHeader, DATA_HEADER_LEN, FRAGMENT_SIZE};
use crate::Error;

const DATA_CHANNEL: ChannelId = 0;
const ACK_CHANNEL: ChannelId = 1;

#[derive(Debug, Clone)]
struct SentPacket {
    header: DataHeader,
    payload_len: usize,
}

/// Scripted transport: records data packets, replays injected acks.
struct MockManager {
    sent: Mutex<Vec<SentPacket>>,
    acks: std::sync::Mutex<mpsc::Receiver<Vec<u8>>>,
    latency: Option<Duration>,
    flushes: AtomicUsize,
}

impl MockManager {
    fn new(acks: mpsc::Receiver<Vec<u8>>, latency: Option<Duration>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            acks: std::sync::Mutex::new(acks),
            latency,
            flushes: AtomicUsize::new(0),
        }
    }

    fn sent_packets(&self) -> Vec<SentPacket> {
        self.sent.lock().clone()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn count_fragment(&self, frame_number: u32, fragment_number: u8) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|p| {
                p.header.frame_number == frame_number && p.header.fragment_number == fragment_number
            })
            .count()
    }
}

impl NetworkManager for MockManager {
    fn send_data(&self, channel: ChannelId, packet: &[u8], ticket: SendTicket) -> crate::Result<()> {
        assert_eq!(channel, DATA_CHANNEL, "data goes out on the data channel");
        let header = DataHeader::decode(packet).expect("packet starts with a data header");
        self.sent.lock().push(SentPacket {
            header,
            payload_len: packet.len() - DATA_HEADER_LEN,
        });
        ticket.complete(SendStatus::Sent);
        Ok(())
    }

    fn read_with_timeout(
        &self,
        channel: ChannelId,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, RecvError> {
        if channel != ACK_CHANNEL {
            std::thread::sleep(timeout);
            return Err(RecvError::TimedOut);
        }
        let acks = self.acks.lock().expect("ack receiver lock");
        match acks.recv_timeout(timeout) {
            Ok(data) => {
                buf[..data.len()].copy_from_slice(&data);
                Ok(data.len())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Err(RecvError::TimedOut),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RecvError::Closed),
        }
    }

    fn estimated_latency(&self) -> Option<Duration> {
        self.latency
    }

    fn flush_channel(&self, channel: ChannelId) {
        assert_eq!(channel, DATA_CHANNEL);
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A running sender wired to a mock transport.
///
/// Field order matters: the sender must drop (stop + join) before the ack
/// injection handle disconnects the mock's ack channel.
struct Harness {
    sender: Sender,
    manager: Arc<MockManager>,
    ack_tx: mpsc::Sender<Vec<u8>>,
    events: mpsc::Receiver<(FrameStatus, Bytes)>,
}

impl Harness {
    /// Start a sender over a fresh mock transport.
    ///
    /// `latency` pins the retry pacing: `Some(200ms)` clamps the wait to
    /// the 50 ms maximum, `Some(1ms)` to the 15 ms minimum.
    fn start(queue_capacity: usize, latency: Option<Duration>) -> Self {
        let (ack_tx, ack_rx) = mpsc::channel();
        let manager = Arc::new(MockManager::new(ack_rx, latency));

        let (event_tx, events) = mpsc::channel();
        let event_tx = std::sync::Mutex::new(event_tx);
        let callback: FrameUpdateCallback = Box::new(move |status, payload| {
            let _ = event_tx
                .lock()
                .expect("event sender lock")
                .send((status, payload.clone()));
        });

        let config = SenderConfig {
            data_channel: DATA_CHANNEL,
            ack_channel: ACK_CHANNEL,
            queue_capacity,
        };
        let sender =
            Sender::new(manager.clone(), config, callback).expect("sender construction");
        sender.start().expect("sender start");

        Self {
            sender,
            manager,
            ack_tx,
            events,
        }
    }

    fn inject_ack(&self, frame_number: u16, low_bits: u64) {
        let packet = AckPacket {
            frame_number,
            high_packets_ack: 0,
            low_packets_ack: low_bits,
        };
        self.ack_tx
            .send(packet.encode().to_vec())
            .expect("ack injection");
    }

    fn expect_event(&self, timeout: Duration) -> (FrameStatus, Bytes) {
        self.events.recv_timeout(timeout).expect("frame callback")
    }

    fn assert_no_event(&self, window: Duration) {
        assert!(
            self.events.recv_timeout(window).is_err(),
            "unexpected frame callback"
        );
    }
}

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn frame_of(len: usize, fill: u8) -> Bytes {
    Bytes::from(vec![fill; len])
}

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn test_frame_is_fragmented_and_completed() {
    let harness = Harness::start(4, Some(Duration::from_millis(200)));

    let backlog = harness
        .sender
        .send_frame(frame_of(3000, 0x11), false)
        .expect("enqueue");
    assert_eq!(backlog, 0);

    // Three fragments of 1000 bytes each.
    let manager = &harness.manager;
    assert!(wait_until(|| manager.sent_count() >= 3, WAIT));
    let packets = manager.sent_packets();
    for (i, packet) in packets.iter().take(3).enumerate() {
        assert_eq!(packet.header.frame_number, 1);
        assert_eq!(packet.header.fragment_number, i as u8);
        assert_eq!(packet.header.fragments_per_frame, 3);
        assert_eq!(packet.payload_len, FRAGMENT_SIZE);
        assert!(!packet.header.is_flush_frame());
    }

    // Full ack: exactly one Sent callback, no further transmissions.
    harness.inject_ack(1, 0b111);
    let (status, payload) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Sent);
    assert_eq!(payload.len(), 3000);
    harness.assert_no_event(Duration::from_millis(150));

    let settled = manager.sent_count();
    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(manager.sent_count(), settled, "no sends after full ack");
    assert_eq!(harness.sender.stats().frames_sent, 1);
}

#[test]
fn test_unacked_fragments_are_retransmitted() {
    let harness = Harness::start(4, Some(Duration::from_millis(200)));
    let manager = &harness.manager;

    // 2500 bytes: fragments of 1000, 1000 and 500 bytes.
    harness
        .sender
        .send_frame(frame_of(2500, 0x22), false)
        .expect("enqueue");
    assert!(wait_until(|| manager.sent_count() >= 3, WAIT));
    assert_eq!(
        manager.sent_packets()[2].payload_len,
        500,
        "tail fragment is short"
    );

    // Only fragment 0 acknowledged: the retry round resends 1 and 2.
    harness.inject_ack(1, 0b001);
    assert!(wait_until(
        || manager.count_fragment(1, 1) >= 2 && manager.count_fragment(1, 2) >= 2,
        WAIT
    ));
    assert_eq!(
        manager.count_fragment(1, 0),
        1,
        "acked fragment is not resent"
    );

    harness.inject_ack(1, 0b111);
    let (status, _) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Sent);
    assert!(harness.sender.stats().retransmits >= 2);
}

#[test]
fn test_flush_preempts_frame_in_flight() {
    let harness = Harness::start(4, Some(Duration::from_millis(200)));
    let manager = &harness.manager;

    let frame_a = frame_of(2000, 0xAA);
    harness
        .sender
        .send_frame(frame_a.clone(), false)
        .expect("enqueue A");
    assert!(wait_until(|| manager.sent_count() >= 2, WAIT));

    // B preempts: A is cancelled, B goes out flagged as a flush frame.
    harness
        .sender
        .send_frame(frame_of(1000, 0xBB), true)
        .expect("enqueue B");

    let (status, payload) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Cancelled);
    assert_eq!(payload, frame_a);

    assert!(wait_until(|| manager.count_fragment(2, 0) >= 1, WAIT));
    let packets = manager.sent_packets();
    let first_b = packets
        .iter()
        .find(|p| p.header.frame_number == 2)
        .expect("frame B transmitted");
    assert!(first_b.header.is_flush_frame());
    assert!(
        manager.flushes.load(Ordering::SeqCst) >= 1,
        "data channel flushed when preempting"
    );

    harness.inject_ack(2, 0b1);
    let (status, _) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Sent);
}

#[test]
fn test_queue_full_rejects_without_callback() {
    // No loops running: enqueued frames stay put.
    let (_tx, rx) = mpsc::channel();
    let manager = Arc::new(MockManager::new(rx, None));
    let cancelled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cancelled);
    let sender = Sender::new(
        manager,
        SenderConfig {
            queue_capacity: 2,
            ..SenderConfig::default()
        },
        Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .expect("sender construction");

    assert_eq!(sender.send_frame(frame_of(10, 1), false).ok(), Some(0));
    assert_eq!(sender.send_frame(frame_of(10, 2), false).ok(), Some(1));
    assert!(matches!(
        sender.send_frame(frame_of(10, 3), false),
        Err(Error::QueueFull)
    ));
    // The rejected frame stays with the producer: no callback for it.
    assert_eq!(cancelled.load(Ordering::SeqCst), 0);
}

#[test]
#[cfg(feature = "ack-wait")]
fn test_low_priority_frame_waits_for_ack() {
    let harness = Harness::start(4, Some(Duration::from_millis(200)));
    let manager = &harness.manager;

    harness
        .sender
        .send_frame(frame_of(1000, 0xAA), false)
        .expect("enqueue A");
    assert!(wait_until(|| manager.sent_count() >= 1, WAIT));

    // B stays gated while A is unacknowledged.
    harness
        .sender
        .send_frame(frame_of(1000, 0xBB), false)
        .expect("enqueue B");
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(
        manager.count_fragment(2, 0),
        0,
        "low-priority frame advanced before ack"
    );

    harness.inject_ack(1, 0b1);
    let (status, _) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Sent);
    assert!(wait_until(|| manager.count_fragment(2, 0) >= 1, WAIT));
}

#[test]
fn test_single_byte_frame() {
    let harness = Harness::start(4, Some(Duration::from_millis(200)));
    let manager = &harness.manager;

    harness
        .sender
        .send_frame(frame_of(1, 0x5A), false)
        .expect("enqueue");
    assert!(wait_until(|| manager.sent_count() >= 1, WAIT));

    let packet = &manager.sent_packets()[0];
    assert_eq!(packet.header.fragments_per_frame, 1);
    assert_eq!(packet.header.fragment_number, 0);
    assert_eq!(packet.payload_len, 1);

    harness.inject_ack(1, 0b1);
    let (status, payload) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Sent);
    assert_eq!(payload.len(), 1);
}

#[test]
fn test_efficiency_reflects_retransmissions() {
    let harness = Harness::start(4, Some(Duration::from_millis(1)));
    let manager = &harness.manager;

    assert_eq!(harness.sender.estimated_efficiency(), 1.0);

    // Let the first frame retransmit a few rounds before acknowledging.
    harness
        .sender
        .send_frame(frame_of(2000, 0x33), false)
        .expect("enqueue");
    assert!(wait_until(|| manager.sent_count() >= 6, WAIT));
    harness.inject_ack(1, 0b11);
    let (status, _) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Sent);

    // The window commits when the next frame is popped.
    harness
        .sender
        .send_frame(frame_of(1000, 0x44), false)
        .expect("enqueue");
    assert!(wait_until(|| manager.count_fragment(2, 0) >= 1, WAIT));

    let efficiency = harness.sender.estimated_efficiency();
    assert!(efficiency > 0.0 && efficiency < 1.0, "got {}", efficiency);

    harness.inject_ack(2, 0b1);
    let (status, _) = harness.expect_event(WAIT);
    assert_eq!(status, FrameStatus::Sent);
}

#[test]
fn test_invalid_frames_rejected() {
    let (_tx, rx) = mpsc::channel();
    let manager = Arc::new(MockManager::new(rx, None));
    let sender = Sender::new(manager, SenderConfig::default(), Box::new(|_, _| {}))
        .expect("sender construction");

    assert!(matches!(
        sender.send_frame(Bytes::new(), false),
        Err(Error::BadParameters(_))
    ));
    assert!(matches!(
        sender.send_frame(frame_of(crate::wire::MAX_FRAME_SIZE + 1, 0), false),
        Err(Error::FrameTooLarge(_))
    ));
}

#[test]
fn test_lifecycle_stop_and_join() {
    let harness = Harness::start(2, Some(Duration::from_millis(1)));

    // Joining running loops without a stop request is misuse.
    assert!(matches!(harness.sender.join(), Err(Error::Busy)));
    // So is starting them twice.
    assert!(matches!(harness.sender.start(), Err(Error::Busy)));

    harness.sender.stop();
    harness.sender.join().expect("loops terminate after stop");
}
