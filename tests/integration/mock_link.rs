//! In-memory serial transport and wire helpers for integration tests.
//!
//! `MockTransport` stands in for the UART: tests script inbound bytes
//! through a shared handle and read back everything the engine wrote.
//! The TX path and the UI bus are process-wide statics, so tests that
//! start an engine serialize on [`LINK_LOCK`] and drain both before
//! asserting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mixdeck::link::channels::TX_CHANNEL;
use mixdeck::link::frame::{encode_frame, framed_len, FrameDecoder};
use mixdeck::link::message::Message;
use mixdeck::link::transport::Transport;
use mixdeck::ui::bus;

/// Serializes engine-based tests (the TX channel is shared state).
pub static LINK_LOCK: Mutex<()> = Mutex::new(());

/// Test-side view of the wire, cloneable across the engine thread
/// boundary.
#[derive(Clone, Default)]
pub struct WireHandle {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<Vec<u8>>>,
}

impl WireHandle {
    /// Queue host-originated bytes for the engine to read.
    pub fn push_rx(&self, bytes: &[u8]) {
        self.rx.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Everything the engine has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.tx.lock().unwrap().clone()
    }
}

pub struct MockTransport {
    wire: WireHandle,
}

impl MockTransport {
    pub fn new() -> (Self, WireHandle) {
        let wire = WireHandle::default();
        (Self { wire: wire.clone() }, wire)
    }
}

impl Transport for MockTransport {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut rx = self.wire.rx.lock().unwrap();
        let n = rx.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            // Guarded by the length check above.
            if let Some(byte) = rx.pop_front() {
                *slot = byte;
            }
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.wire.tx.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Frame a message the way the host would.
pub fn frame_message(msg: &Message) -> Vec<u8> {
    let payload = msg.to_json().unwrap();
    let mut buf = vec![0u8; framed_len(payload.len())];
    let n = encode_frame(&payload, &mut buf).unwrap();
    buf.truncate(n);
    buf
}

/// Parse every complete frame out of captured TX bytes.
pub fn decode_messages(bytes: &[u8]) -> Vec<Message> {
    let mut decoder = FrameDecoder::new();
    let mut out = Vec::new();
    decoder.feed(bytes, |payload| {
        out.push(Message::from_json(payload).unwrap());
    });
    out
}

/// Reset the process-wide statics between engine tests.
pub fn drain_shared_state() {
    while TX_CHANNEL.try_receive().is_ok() {}
    while bus::try_next().is_some() {}
}

/// Poll `predicate` until it holds or the timeout expires. Engine I/O
/// runs on its own thread, so assertions on its side effects wait.
pub fn wait_for(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    predicate()
}
