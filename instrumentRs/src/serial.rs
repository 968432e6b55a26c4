//! This module opens serial ports as instrument interfaces using the `serialport` crate.

use std::time::Duration;

use serialport::{SerialPort, SerialPortBuilder};

use crate::{Instrument, InstrumentError};

/// Constructors for blocking serial instrument interfaces.
///
/// Both return an [`Instrument`] wrapping the opened port. The read timeout configured on the
/// port bounds every fixed-width read.
#[derive(Debug)]
pub struct SerialInterface {}

impl SerialInterface {
    /// Open a serial port with 8N1 framing, the given baud rate, and a 3 second read timeout.
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud` - The baud rate.
    pub fn simple(port: &str, baud: u32) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let spb = serialport::new(port, baud).timeout(Duration::from_secs(3));
        Self::full(spb)
    }

    /// Open a serial port from a fully configured [`SerialPortBuilder`].
    ///
    /// See [`serialport::new`] for how to configure parity, stop bits, timeout, etc.
    pub fn full(spb: SerialPortBuilder) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let port = spb.open()?;
        let timeout = port.timeout();
        tracing::debug!(port = ?port.name(), ?timeout, "opened serial port");
        Ok(Instrument::new(port, timeout))
    }
}
