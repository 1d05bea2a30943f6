//! Async serial link engine — reactor-driven UART bridge.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! multi-task scheduling and `async-io-mini` for reactor-driven timers
//! (no busy-spinning). Two concurrent futures:
//!
//! 1. **Read** — polls the transport every 1ms via reactor timer,
//!    feeds the frame decoder, and routes each validated message
//! 2. **Write** — truly async via `TX_CHANNEL.receive().await`
//!    (wakes instantly when an application thread queues a frame)
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────┐
//!  │  Link Thread (Core 0)                                │
//!  │  ┌────────────────────────────────────────────────┐  │
//!  │  │  futures_lite::block_on (drives reactor)       │  │
//!  │  │  ┌────────────────────────────────────────────┐│  │
//!  │  │  │  edge_executor::LocalExecutor              ││  │
//!  │  │  │  ┌──────────────┐  ┌───────────────────┐  ││  │
//!  │  │  │  │ Read 1ms ⏱  │  │ Write (async)     │  ││  │
//!  │  │  │  │ decode+route │  │ wake-on-send      │  ││  │
//!  │  │  │  └──────────────┘  └───────────────────┘  ││  │
//!  │  │  └────────────────────────────────────────────┘│  │
//!  │  └────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────┘
//! ```
//!
//! Message handlers run synchronously on the read future, so the
//! router's subscribers must never block.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use super::channels::{TxFrame, MAX_TX_FRAME, TX_CHANNEL};
use super::frame::{encode_frame, framed_len, FrameDecoder};
use super::message::{Message, SchemaError};
use super::router::MessageRouter;
use super::transport::Transport;

const READ_BUF_SIZE: usize = 512;

// ── Counters ─────────────────────────────────────────────────

/// Link health counters, shared across threads.
///
/// All counters are monotonic and wrap at `u32::MAX`; consumers diff
/// successive reads rather than interpret absolute values.
///
/// There is no inbound-overrun counter: decoded messages are routed
/// inline on the read future, so nothing can be dropped between
/// decode and dispatch.
#[derive(Debug, Default)]
pub struct LinkStats {
    /// Validated messages handed to the router.
    pub messages_received: AtomicU32,
    /// Frames written to the transport.
    pub messages_sent: AtomicU32,
    /// Payloads that failed JSON parse or schema validation.
    pub parse_errors: AtomicU32,
    /// CRC / length failures inside the frame decoder.
    pub framing_errors: AtomicU32,
    /// Sends that gave up after their deadline.
    pub tx_backpressure: AtomicU32,
    /// Transport write failures.
    pub write_errors: AtomicU32,
}

impl LinkStats {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Errors ───────────────────────────────────────────────────

/// Failures surfaced to callers of [`LinkTx::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The TX queue stayed full past the caller's deadline.
    Backpressure,
    /// The encoded frame exceeds [`MAX_TX_FRAME`].
    FrameTooLarge,
    /// The message could not be serialized.
    Encode,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Backpressure => write!(f, "tx queue full past deadline"),
            Self::FrameTooLarge => write!(f, "frame exceeds tx buffer"),
            Self::Encode => write!(f, "message encode failed"),
        }
    }
}

// ── Sender handle ────────────────────────────────────────────

/// Cloneable handle for queueing outbound messages.
///
/// `send` serializes, frames, and enqueues; the link thread performs
/// the actual UART write. When the queue is full the call retries
/// until `deadline_ms` elapses, then reports [`LinkError::Backpressure`]
/// — the caller decides whether to drop or escalate.
#[derive(Clone)]
pub struct LinkTx {
    stats: Arc<LinkStats>,
}

impl LinkTx {
    pub fn send(&self, msg: &Message, deadline_ms: u32) -> Result<(), LinkError> {
        let payload = msg.to_json().map_err(|_: SchemaError| LinkError::Encode)?;
        if framed_len(payload.len()) > MAX_TX_FRAME {
            return Err(LinkError::FrameTooLarge);
        }

        let mut buf = [0u8; MAX_TX_FRAME];
        let n = encode_frame(&payload, &mut buf).map_err(|_| LinkError::FrameTooLarge)?;
        let mut data = heapless::Vec::new();
        // Capacity checked above.
        data.extend_from_slice(&buf[..n])
            .map_err(|()| LinkError::FrameTooLarge)?;

        let mut frame = TxFrame { data };
        let deadline = Instant::now() + Duration::from_millis(u64::from(deadline_ms));
        loop {
            match TX_CHANNEL.try_send(frame) {
                Ok(()) => return Ok(()),
                Err(embassy_sync::channel::TrySendError::Full(rejected)) => {
                    if Instant::now() >= deadline {
                        LinkStats::bump(&self.stats.tx_backpressure);
                        warn!("link: tx backpressure, dropping {}", msg.kind().wire_name());
                        return Err(LinkError::Backpressure);
                    }
                    frame = rejected;
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

/// Message-level outbound seam. Production wires this to [`LinkTx`];
/// tests record sent messages instead.
pub trait CommandSink: Send + Sync {
    fn send_command(&self, msg: &Message) -> Result<(), LinkError>;
}

/// [`CommandSink`] over the live serial link, with a fixed deadline.
pub struct LinkCommandSink {
    tx: LinkTx,
    deadline_ms: u32,
}

impl LinkCommandSink {
    pub fn new(tx: LinkTx, deadline_ms: u32) -> Self {
        Self { tx, deadline_ms }
    }
}

impl CommandSink for LinkCommandSink {
    fn send_command(&self, msg: &Message) -> Result<(), LinkError> {
        self.tx.send(msg, self.deadline_ms)
    }
}

// ── Engine ───────────────────────────────────────────────────

/// Owns the transport and the link I/O thread.
pub struct SerialEngine<T: Transport + Send + 'static> {
    transport: Option<T>,
    stats: Arc<LinkStats>,
    running: Arc<AtomicBool>,
    stop_drain_ms: u32,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl<T: Transport + Send + 'static> SerialEngine<T> {
    pub fn new(transport: T, stop_drain_ms: u32) -> Self {
        Self {
            transport: Some(transport),
            stats: Arc::new(LinkStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            stop_drain_ms,
            handle: None,
        }
    }

    /// Handle for queueing outbound messages. Valid before and after
    /// `start`; frames queued while stopped sit in the channel.
    pub fn tx(&self) -> LinkTx {
        LinkTx {
            stats: self.stats.clone(),
        }
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        self.stats.clone()
    }

    /// Spawn the link thread. The router moves onto that thread; all
    /// subscriber callbacks run there. No-op if already running.
    pub fn start(&mut self, router: MessageRouter) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(transport) = self.transport.take() else {
            return;
        };

        let stats = self.stats.clone();
        let running = self.running.clone();
        let drain_ms = self.stop_drain_ms;
        let spec = crate::drivers::task_pin::ThreadSpec::new(
            crate::drivers::task_pin::Core::LinkIo,
            12,
            16,
            "link-io\0",
        );
        self.handle =
            Some(spec.spawn(move || run_io_loop(transport, router, stats, running, drain_ms)));
    }

    /// Stop the link thread, draining queued TX frames for up to the
    /// configured budget. Idempotent.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("link: io thread panicked during stop");
            }
        }
    }
}

// ── Async I/O loop ───────────────────────────────────────────

type Shared<T> = Rc<RefCell<T>>;

fn write_frame<T: Transport>(transport: &mut T, data: &[u8], stats: &LinkStats) {
    let mut written = 0;
    while written < data.len() {
        match transport.write(&data[written..]) {
            Ok(0) => {
                // Transport wedged; count it and drop the rest.
                LinkStats::bump(&stats.write_errors);
                return;
            }
            Ok(n) => written += n,
            Err(e) => {
                warn!("link: write failed: {e:?}");
                LinkStats::bump(&stats.write_errors);
                return;
            }
        }
    }
    if transport.flush().is_err() {
        LinkStats::bump(&stats.write_errors);
        return;
    }
    LinkStats::bump(&stats.messages_sent);
}

/// Read future — polls the transport at 1ms intervals, decodes frames,
/// and routes validated messages. The 1ms reactor timer is wake-based
/// (not `thread::sleep`), so the executor can service the write future
/// between ticks.
async fn read_loop<T: Transport>(
    transport: Shared<T>,
    router: Shared<MessageRouter>,
    stats: Arc<LinkStats>,
    running: Arc<AtomicBool>,
) {
    let mut decoder = FrameDecoder::new();
    let mut read_buf = [0u8; READ_BUF_SIZE];
    while running.load(Ordering::Relaxed) {
        {
            let mut t = transport.borrow_mut();
            loop {
                let n = match t.read(&mut read_buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!("link: read failed: {e:?}");
                        break;
                    }
                };
                let mut r = router.borrow_mut();
                decoder.feed(&read_buf[..n], |payload| match Message::from_json(payload) {
                    Ok(msg) => {
                        LinkStats::bump(&stats.messages_received);
                        r.route(&msg);
                    }
                    Err(e) => {
                        LinkStats::bump(&stats.parse_errors);
                        warn!("link: dropping payload: {e}");
                    }
                });
                if n < read_buf.len() {
                    break;
                }
            }
            stats
                .framing_errors
                .store(decoder.framing_errors(), Ordering::Relaxed);
        }
        async_io_mini::Timer::after(Duration::from_millis(1)).await;
    }
}

/// Write future — truly async, wakes instantly when an application
/// thread pushes a frame via `TX_CHANNEL.try_send()`. No polling.
async fn tx_loop<T: Transport>(transport: Shared<T>, stats: Arc<LinkStats>) {
    loop {
        let frame = TX_CHANNEL.receive().await;
        write_frame(&mut *transport.borrow_mut(), &frame.data, &stats);
    }
}

/// Entry point for the link thread. Sets up the executor, spawns the
/// read and write futures, and parks until `running` clears, then
/// drains queued TX frames within the stop budget.
fn run_io_loop<T: Transport>(
    transport: T,
    router: MessageRouter,
    stats: Arc<LinkStats>,
    running: Arc<AtomicBool>,
    stop_drain_ms: u32,
) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    let transport: Shared<T> = Rc::new(RefCell::new(transport));
    let router: Shared<MessageRouter> = Rc::new(RefCell::new(router));

    executor
        .spawn(read_loop(
            transport.clone(),
            router.clone(),
            stats.clone(),
            running.clone(),
        ))
        .detach();
    executor
        .spawn(tx_loop(transport.clone(), stats.clone()))
        .detach();

    info!("link: io task started (async, reactor-driven)");

    futures_lite::future::block_on(executor.run(async {
        while running.load(Ordering::Relaxed) {
            async_io_mini::Timer::after(Duration::from_millis(10)).await;
        }
    }));

    // Best-effort drain so commands queued just before shutdown still
    // reach the host.
    let deadline = Instant::now() + Duration::from_millis(u64::from(stop_drain_ms));
    while Instant::now() < deadline {
        match TX_CHANNEL.try_receive() {
            Ok(frame) => write_frame(&mut *transport.borrow_mut(), &frame.data, &stats),
            Err(_) => break,
        }
    }

    info!("link: io task stopped");
}
