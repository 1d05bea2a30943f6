//! Byte transport under the serial engine.
//!
//! The engine is generic over [`Transport`]: production runs the UART
//! driver, disconnected simulation runs [`NullTransport`], and the
//! integration harness substitutes an in-memory pipe. Swapping the
//! wire never touches the link logic.

/// A non-blocking byte channel.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Pull whatever is buffered, up to `buf.len()` bytes. `Ok(0)`
    /// means nothing was pending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Push as much of `data` as the channel will take right now and
    /// return how much it took.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Block until previously accepted bytes are on the wire.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Transport that is permanently idle: reads yield nothing, writes are
/// accepted and discarded. Lets the firmware boot with no host attached.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = core::convert::Infallible;

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
