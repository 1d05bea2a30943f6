//! Length-prefixed frame codec for the host serial link.
//!
//! Wire format (all integers little-endian):
//! ```text
//! ┌───────────┬─────────────┬──────────────┬───────────────────┬──────────────┐
//! │ Magic (4B)│ Length (2B) │ Hdr CRC (2B) │ Payload (N bytes) │ CRC32 (4B)   │
//! │ AA 55 4D 58│ u16 LE     │ CRC16 of     │ UTF-8 JSON        │ CRC32 of     │
//! │           │             │ magic+length │                   │ payload      │
//! └───────────┴─────────────┴──────────────┴───────────────────┴──────────────┘
//! ```
//!
//! The decoder is a Sync → Header → Body automaton that accumulates
//! incoming bytes and yields complete, CRC-verified payloads. Partial
//! reads are handled gracefully — a single transport read may return
//! part of the header, part of the payload, or multiple frames
//! concatenated. Any integrity failure discards the frame in progress,
//! bumps the framing-error counter, and resumes the magic search.

/// Frame synchronisation pattern.
pub const FRAME_MAGIC: [u8; 4] = [0xAA, 0x55, 0x4D, 0x58];

/// Maximum frame payload size (matches the host message limit).
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024;

/// Fixed header size: magic + length + header CRC.
pub const HEADER_LEN: usize = 8;

/// Trailing payload CRC size.
pub const TRAILER_LEN: usize = 4;

/// Errors surfaced by [`encode_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Payload exceeds [`MAX_PAYLOAD_LEN`].
    PayloadTooLarge,
    /// Output buffer cannot hold the framed payload.
    BufferTooSmall,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::BufferTooSmall => write!(f, "output buffer too small"),
        }
    }
}

// ── CRC primitives ───────────────────────────────────────────
//
// CRC16-CCITT (poly 0x1021, init 0xFFFF) guards the header;
// CRC32 (IEEE, reflected) guards the payload.

pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

pub fn crc32_ieee(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ── Encoder ──────────────────────────────────────────────────

/// Total framed size for a payload of `len` bytes.
pub const fn framed_len(len: usize) -> usize {
    HEADER_LEN + len + TRAILER_LEN
}

/// Encode `payload` into a complete frame in `out`.
///
/// Returns the number of bytes written.
pub fn encode_frame(payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge);
    }
    let total = framed_len(payload.len());
    if out.len() < total {
        return Err(FrameError::BufferTooSmall);
    }

    out[..4].copy_from_slice(&FRAME_MAGIC);
    out[4..6].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    let hcrc = crc16_ccitt(&out[..6]);
    out[6..8].copy_from_slice(&hcrc.to_le_bytes());
    out[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
    let pcrc = crc32_ieee(payload);
    out[HEADER_LEN + payload.len()..total].copy_from_slice(&pcrc.to_le_bytes());

    Ok(total)
}

// ── Decoder ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Scanning for the 4-byte magic pattern.
    Sync,
    /// Magic found; collecting length + header CRC.
    Header,
    /// Header verified; collecting payload + trailing CRC32.
    Body,
}

/// Streaming frame decoder.
///
/// Owns a single payload buffer sized at the length cap; nothing else
/// is allocated per frame. `feed` never blocks.
pub struct FrameDecoder {
    state: DecodeState,
    /// How many leading magic bytes have matched so far.
    magic_matched: usize,
    /// Length + header-CRC bytes collected in `Header`.
    header_buf: [u8; HEADER_LEN - 4],
    header_fill: usize,
    /// Payload bytes collected in `Body`.
    payload_buf: Vec<u8>,
    expected: usize,
    /// Trailing CRC bytes collected in `Body`.
    trailer_buf: [u8; TRAILER_LEN],
    trailer_fill: usize,
    framing_errors: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Sync,
            magic_matched: 0,
            header_buf: [0; HEADER_LEN - 4],
            header_fill: 0,
            payload_buf: Vec::with_capacity(MAX_PAYLOAD_LEN),
            expected: 0,
            trailer_buf: [0; TRAILER_LEN],
            trailer_fill: 0,
            framing_errors: 0,
        }
    }

    /// Cumulative count of header-CRC, payload-CRC, and oversize-length
    /// failures since construction.
    pub fn framing_errors(&self) -> u32 {
        self.framing_errors
    }

    /// Reset to `Sync`, discarding any frame in progress.
    pub fn reset(&mut self) {
        self.state = DecodeState::Sync;
        self.magic_matched = 0;
        self.header_fill = 0;
        self.payload_buf.clear();
        self.expected = 0;
        self.trailer_fill = 0;
    }

    fn fail(&mut self) {
        self.framing_errors = self.framing_errors.wrapping_add(1);
        self.reset();
    }

    /// Feed a chunk of bytes; `sink` is invoked once per complete,
    /// CRC-verified payload. The slice is valid for the duration of
    /// the callback only.
    pub fn feed(&mut self, chunk: &[u8], mut sink: impl FnMut(&[u8])) {
        for &byte in chunk {
            match self.state {
                DecodeState::Sync => {
                    if byte == FRAME_MAGIC[self.magic_matched] {
                        self.magic_matched += 1;
                        if self.magic_matched == FRAME_MAGIC.len() {
                            self.state = DecodeState::Header;
                            self.header_fill = 0;
                        }
                    } else {
                        // A mismatch may still start a new magic run.
                        self.magic_matched = usize::from(byte == FRAME_MAGIC[0]);
                    }
                }

                DecodeState::Header => {
                    self.header_buf[self.header_fill] = byte;
                    self.header_fill += 1;
                    if self.header_fill == self.header_buf.len() {
                        self.on_header_complete();
                    }
                }

                DecodeState::Body => {
                    if self.payload_buf.len() < self.expected {
                        self.payload_buf.push(byte);
                    } else {
                        self.trailer_buf[self.trailer_fill] = byte;
                        self.trailer_fill += 1;
                        if self.trailer_fill == TRAILER_LEN {
                            let received = u32::from_le_bytes(self.trailer_buf);
                            if received == crc32_ieee(&self.payload_buf) {
                                sink(&self.payload_buf);
                                self.reset();
                            } else {
                                self.fail();
                            }
                        }
                    }
                }
            }
        }
    }

    fn on_header_complete(&mut self) {
        let length = u16::from_le_bytes([self.header_buf[0], self.header_buf[1]]) as usize;
        let received = u16::from_le_bytes([self.header_buf[2], self.header_buf[3]]);

        let mut head = [0u8; 6];
        head[..4].copy_from_slice(&FRAME_MAGIC);
        head[4..6].copy_from_slice(&(length as u16).to_le_bytes());

        if received != crc16_ccitt(&head) || length > MAX_PAYLOAD_LEN {
            self.fail();
            return;
        }

        self.expected = length;
        self.payload_buf.clear();
        self.trailer_fill = 0;
        self.state = DecodeState::Body;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
