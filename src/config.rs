//! System configuration parameters.
//!
//! All tunable startup constants for the MixDeck appliance. There is no
//! runtime configuration file; values are fixed at construction time and
//! handed to the subsystems that need them.

/// Core system configuration.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    // --- Serial link ---
    /// UART baud rate (8N1).
    pub baud_rate: u32,
    /// Interrupt-fed RX ring buffer size in bytes.
    pub rx_ring_bytes: usize,
    /// UART TX buffer size in bytes.
    pub tx_buffer_bytes: usize,
    /// Default deadline for outbound sends before `Backpressure` (ms).
    pub tx_deadline_ms: u32,
    /// TX drain budget during engine shutdown (ms).
    pub stop_drain_ms: u32,

    // --- Assets ---
    /// Pending logo request expiry (ms).
    pub asset_timeout_ms: u32,

    // --- UI ---
    /// GUI tick / intent drain period (ms).
    pub ui_tick_ms: u32,

    // --- Identity ---
    /// Device id stamped on every outbound message.
    pub device_id: &'static str,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Serial link
            baud_rate: 115_200,
            rx_ring_bytes: 4096,
            tx_buffer_bytes: 2048,
            tx_deadline_ms: 50,
            stop_drain_ms: 200,

            // Assets
            asset_timeout_ms: 30_000,

            // UI
            ui_tick_ms: 10,

            // Identity
            device_id: "MIXDECK-1",
        }
    }
}
