//! UART transport to the host PC.
//!
//! Uses the ESP-IDF UART driver with an interrupt-fed RX ring buffer:
//! the ISR copies bytes into the ring without parsing, and the link
//! task's non-blocking reads drain it. Only compiled for the device
//! target; host tests substitute an in-memory transport.

#[cfg(target_os = "espidf")]
pub use esp_impl::UartTransport;

#[cfg(target_os = "espidf")]
mod esp_impl {
    use esp_idf_hal::delay::NON_BLOCK;
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::uart::{config::Config, Uart, UartDriver};
    use esp_idf_hal::units::Hertz;

    use crate::error::{Error, Result};
    use crate::link::transport::Transport;

    pub struct UartTransport {
        driver: UartDriver<'static>,
    }

    impl UartTransport {
        /// Install the UART driver with the given ring/TX buffer sizes.
        pub fn new(
            uart: impl Peripheral<P = impl Uart> + 'static,
            tx: AnyIOPin,
            rx: AnyIOPin,
            baud_rate: u32,
            rx_ring_bytes: usize,
            tx_buffer_bytes: usize,
        ) -> Result<Self> {
            let config = Config::default()
                .baudrate(Hertz(baud_rate))
                .rx_fifo_size(rx_ring_bytes)
                .tx_fifo_size(tx_buffer_bytes);
            let driver = UartDriver::new(
                uart,
                tx,
                rx,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &config,
            )
            .map_err(|_| Error::Init("uart driver install"))?;
            Ok(Self { driver })
        }
    }

    impl Transport for UartTransport {
        type Error = esp_idf_hal::sys::EspError;

        fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
            self.driver.read(buf, NON_BLOCK)
        }

        fn write(&mut self, data: &[u8]) -> core::result::Result<usize, Self::Error> {
            self.driver.write(data)
        }

        fn flush(&mut self) -> core::result::Result<(), Self::Error> {
            self.driver.wait_tx_done(100)
        }
    }
}
