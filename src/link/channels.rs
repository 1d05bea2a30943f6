//! Link inter-task communication channels.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge application
//! threads with the async link I/O task. The channels are static, so
//! both sides share them without heap allocation.
//!
//! ```text
//! ┌──────────────┐   TxFrame    ┌──────────────┐
//! │  App threads │────────────▶│  Link I/O     │──▶ UART
//! │  (sync)      │             │  task (async) │
//! └──────────────┘             └──────────────┘
//! ```
//!
//! Inbound traffic does not need a channel: the router runs directly on
//! the I/O task, so decoded messages are dispatched in place.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

/// Largest encoded outbound frame. Device-originated messages (volume
/// commands, asset requests, status polls) are all far smaller than
/// host-originated snapshots.
pub const MAX_TX_FRAME: usize = 512;

/// One fully-encoded frame (header + payload + trailer), ready to write.
pub struct TxFrame {
    pub data: Vec<u8, MAX_TX_FRAME>,
}

/// Outbound frame channel depth.
const TX_DEPTH: usize = 8;

/// Outbound frame channel: application → link I/O task.
pub static TX_CHANNEL: Channel<CriticalSectionRawMutex, TxFrame, TX_DEPTH> = Channel::new();
