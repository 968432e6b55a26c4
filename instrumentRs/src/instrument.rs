//! This module provides [`Instrument`], the [`InstrumentInterface`] implementation for any byte
//! stream, and the [`InstrumentError`] enum shared by all drivers.
//!
//! It can be used with any type that implements [`std::io::Read`] and [`std::io::Write`], such as
//! a boxed [`serialport::SerialPort`] or a [`std::net::TcpStream`].

use std::{io::ErrorKind, time::Duration};

use thiserror::Error;

use crate::InstrumentInterface;

/// A general instrument interface that can be built with any port that implements
/// [`std::io::Read`] and [`std::io::Write`].
///
/// The port is expected to enforce its own read timeout (a serial port does). A read that times
/// out or hits the end of the stream before the requested number of bytes is an
/// [`InstrumentError::IncompleteResponse`].
///
/// # Example
///
/// ```no_run
/// use std::{net::TcpStream, time::Duration};
///
/// use instrumentrs::Instrument;
///
/// let stream = TcpStream::connect("192.168.10.1:8000").unwrap();
/// stream.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
/// let inst_interface = Instrument::new(stream, Duration::from_secs(1));
/// ```
pub struct Instrument<P: std::io::Read + std::io::Write> {
    port: P,
    terminator: String,
    timeout: Duration,
}

impl<P: std::io::Read + std::io::Write> Instrument<P> {
    /// Create a new [`Instrument`] from a port.
    ///
    /// # Arguments
    /// * `port` - The byte stream to talk over.
    /// * `timeout` - The read timeout the port was configured with. It is only reported, the
    ///   port itself must enforce it.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            terminator: "\n".to_string(),
            timeout,
        }
    }
}

impl<P: std::io::Read + std::io::Write> InstrumentInterface for Instrument<P> {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if filled < buf.len() {
            tracing::debug!(
                expected = buf.len(),
                received = filled,
                "read ended before the reply was complete"
            );
            return Err(InstrumentError::IncompleteResponse {
                expected: buf.len(),
                received: String::from_utf8_lossy(&buf[..filled]).into_owned(),
            });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.port.flush()?;
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }
}

/// The error enum for all instruments.
///
/// Every command or query of a driver returns either its result or an [`InstrumentError`], such
/// that errors propagate with the `?` operator from the port all the way to the caller. There is
/// no retry: what goes wrong on the wire is reported, and the caller decides whether to reopen
/// the connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// A given float value is out of the specified range. Nothing was sent to the instrument.
    #[error("Float value {value} is out of range. Allowed range is [{min}, {max}]")]
    FloatValueOutOfRange {
        /// The value that is out of range.
        value: f64,
        /// The minimum value that is allowed.
        min: f64,
        /// The maximum value that is allowed.
        max: f64,
    },
    /// A given integer value is out of the specified range. Nothing was sent to the instrument.
    #[error("Integer value {value} is out of range. Allowed range is [{min}, {max}]")]
    IntValueOutOfRange {
        /// The value that is out of range.
        value: i64,
        /// The minimum value that is allowed.
        min: i64,
        /// The maximum value that is allowed.
        max: i64,
    },
    /// Error when an invalid argument is passed to a function. The message is intended for the
    /// user.
    #[error("{0}")]
    InvalidArgument(String),
    /// The instrument stopped sending before a fixed-width reply was complete, usually because
    /// the read timed out. Contains the expected length and the bytes that did arrive.
    #[error("Incomplete response: expected {expected} bytes, received {received:?}")]
    IncompleteResponse {
        /// Number of bytes the reply should have had.
        expected: usize,
        /// Whatever was received before the read gave up.
        received: String,
    },
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A background poller ended without reporting back, e.g., because its thread panicked.
    #[error("The background poller stopped without reporting a result")]
    PollerDisconnected,
    /// Instrument response could not be parsed because it was unexpected by the driver. This
    /// error contains the response that was received from the instrument.
    #[error("Response from instrument could not be parsed. Response was: {0:?}")]
    ResponseParseError(String),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening a serial interface. See the [`serialport::Error`]
    /// documentation for more information.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
}
