//! InstrumentRs: the transport layer for request/reply instruments with fixed-width replies.
//!
//! Many lab controllers speak a simple line protocol: the host writes a newline-terminated
//! command and, for queries, the instrument answers with a reply of a known, fixed number of
//! bytes (value padded to a fixed width, followed by a unit suffix). This crate provides what a
//! driver for such an instrument needs from its port and nothing more:
//!
//! - the [`InstrumentInterface`] trait: write bytes, read exactly `n` bytes bounded by a
//!   timeout, close,
//! - [`Instrument`], an implementation for anything that is [`std::io::Read`] +
//!   [`std::io::Write`],
//! - [`SerialInterface`] to open a serial port using the [`serialport`] crate (feature
//!   `serial`),
//! - [`LoopbackInterface`], a scripted test double that checks every command a driver sends,
//! - [`InstrumentError`], the error type all drivers return.
//!
//! A reply that does not arrive completely within the timeout is never padded or silently
//! dropped: it is reported as [`InstrumentError::IncompleteResponse`] together with whatever
//! bytes did arrive.
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod instrument;
mod loopback;
#[cfg(feature = "serial")]
mod serial;

pub use instrument::{Instrument, InstrumentError};
pub use loopback::LoopbackInterface;
#[cfg(feature = "serial")]
pub use serial::SerialInterface;

use std::time::Duration;

/// Default read timeout that is reported by interfaces that do not know their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// The `InstrumentInterface` trait defines the byte-level link to an instrument.
///
/// Implementors only have to provide [`write_raw`](InstrumentInterface::write_raw) and
/// [`read_exact`](InstrumentInterface::read_exact). Sending terminated commands and reading
/// fixed-width replies are provided on top of these two.
///
/// The protocol is strictly half-duplex: a caller must read the full reply to a query before
/// it sends the next command.
pub trait InstrumentInterface {
    /// Write all bytes to the instrument and flush them.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    /// Fill `buf` completely with bytes from the instrument.
    ///
    /// Blocks at most for the interface timeout. If fewer bytes than requested arrive, this
    /// must return [`InstrumentError::IncompleteResponse`].
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// Close the interface.
    ///
    /// Interfaces that close when dropped can rely on the default, which does nothing.
    fn close(&mut self) -> Result<(), InstrumentError> {
        Ok(())
    }

    /// Get the terminator that is appended to every command.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Set the terminator of an interface from a `&str`.
    ///
    /// # Arguments:
    /// - `_terminator` - A string slice that will be appended to commands.
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Get the read timeout of the interface.
    fn get_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Send a command to the instrument.
    ///
    /// The terminator is appended to the command before it is written.
    ///
    /// # Arguments:
    /// - `cmd` - The command without terminator.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let line = format!("{cmd}{}", self.get_terminator());
        self.write_raw(line.as_bytes())
    }

    /// Read a reply of exactly `len` bytes and return it as a string, unmodified.
    ///
    /// # Arguments:
    /// - `len` - Number of bytes the instrument answers with.
    fn read_fixed(&mut self, len: usize) -> Result<String, InstrumentError> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| {
            InstrumentError::ResponseParseError(String::from_utf8_lossy(e.as_bytes()).into_owned())
        })
    }

    /// Send a query and read its fixed-width reply.
    ///
    /// # Arguments:
    /// - `cmd` - The query without terminator.
    /// - `len` - Number of bytes the instrument answers with.
    fn query_fixed(&mut self, cmd: &str, len: usize) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        self.read_fixed(len)
    }
}
