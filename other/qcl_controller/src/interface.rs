//! Provide a serial interface for the QCL controller.

use std::time::Duration;

use instrumentrs::{Instrument, InstrumentError, SerialInterface};
use serialport::{SerialPort, SerialPortBuilder};

/// Baud rate of the controller.
pub const BAUD_RATE: u32 = 115_200;

/// Read timeout for every fixed-width reply.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A SerialInterface for the QCL controller.
///
/// Builds an InstrumentRs serial interface with the baud rate, framing, and timeout the
/// controller expects.
#[derive(Debug)]
pub struct SerialInterfaceQcl {}

impl SerialInterfaceQcl {
    /// Open the controller at the given port with 115200 baud, 8N1, and a 1 second timeout.
    ///
    /// Arguments:
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM1"`.
    pub fn simple(port: &str) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        SerialInterface::full(Self::builder(port))
    }

    /// Open the controller from a custom port configuration.
    ///
    /// Start from [`SerialInterfaceQcl::builder`] to keep the controller defaults.
    pub fn full(spb: SerialPortBuilder) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        SerialInterface::full(spb)
    }

    /// A port builder with the controller defaults.
    pub fn builder(port: &str) -> SerialPortBuilder {
        serialport::new(port, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
    }
}
