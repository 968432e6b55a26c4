//! The loopback module provides a scripted instrument for testing drivers.

use std::collections::VecDeque;

use crate::{InstrumentError, InstrumentInterface};

/// A self-incrementing index structure that by default starts at 0 and increments whenever `next`
/// is called.
#[derive(Debug, Default)]
struct IncrIndex {
    index: usize,
}

impl IncrIndex {
    fn next(&mut self) -> usize {
        let current = self.index;
        self.index += 1;
        current
    }
}

/// An interface that replays a fixed script of commands and replies.
///
/// Commands from the host are checked in order against `from_host`; the terminator is appended
/// to every expected command before comparing. Replies in `from_inst` are handed out as raw
/// bytes, exactly as given, since fixed-width replies carry their own suffix. Reads are
/// byte-oriented: a read may span two scripted replies, just like on a real port.
///
/// When the script has no more reply bytes, a read fails with
/// [`InstrumentError::IncompleteResponse`], which is what a real port does after its timeout.
/// An unexpected command panics. When the interface is dropped, it panics if any scripted
/// command or reply was not used.
///
/// # Example
///
/// ```
/// use instrumentrs::{InstrumentInterface, LoopbackInterface};
///
/// let mut lbk = LoopbackInterface::new(
///     vec![":laser:set?".to_string()],
///     vec!["1000.00 cm-1\n".to_string()],
/// );
/// let reply = lbk.query_fixed(":laser:set?", 13).unwrap();
/// assert_eq!(reply, "1000.00 cm-1\n");
/// ```
pub struct LoopbackInterface {
    from_host: Vec<String>,
    from_inst: Vec<String>,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    terminator: String,
}

impl LoopbackInterface {
    /// Create a new loopback interface with the commands expected from the host and the replies
    /// the instrument sends back.
    ///
    /// # Arguments:
    /// * `from_host` - Commands from host to instrument, without terminator.
    /// * `from_inst` - Raw replies from instrument to host.
    pub fn new(from_host: Vec<String>, from_inst: Vec<String>) -> Self {
        LoopbackInterface {
            from_host,
            from_inst,
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            terminator: "\n".to_string(),
        }
    }

    /// This command panics if not all commands and replies have been used.
    ///
    /// It is called automatically when the [`LoopbackInterface`] is dropped.
    pub fn finalize(&mut self) {
        if let Some(fil) = self.from_host.get(self.from_host_index.index) {
            panic!("Leftover expected commands found from host to instrument: {fil:?}");
        }
        if let Some(fil) = self.from_inst.get(self.from_inst_index.index) {
            panic!("Leftover expected replies found from instrument to host: {fil:?}");
        }
        if !self.curr_bytes.is_empty() {
            panic!(
                "Leftover reply bytes from instrument to host: {:?}",
                String::from_utf8_lossy(self.curr_bytes.make_contiguous())
            );
        }
    }

    /// Number of scripted commands the host has sent so far.
    pub fn commands_received(&self) -> usize {
        self.from_host_index.index
    }

    /// Get the next command from host to instrument including the terminator, or panic.
    fn get_next_from_host_with_terminator(&mut self) -> String {
        let cmd = self
            .from_host
            .get(self.from_host_index.next())
            .expect("No more commands were expected from host to instrument.");
        format!("{cmd}{}", self.terminator)
    }

    /// Read one byte, moving on to the next scripted reply when the current one is used up.
    fn read_one_byte(&mut self) -> Option<u8> {
        while self.curr_bytes.is_empty() {
            let next = self.from_inst.get(self.from_inst_index.index)?;
            self.curr_bytes = next.bytes().collect();
            self.from_inst_index.next();
        }
        self.curr_bytes.pop_front()
    }
}

impl InstrumentInterface for LoopbackInterface {
    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), InstrumentError> {
        let exp = self.get_next_from_host_with_terminator();
        assert_eq!(
            exp.as_bytes(),
            cmd,
            "Expected command {exp:?}, got {:?}",
            String::from_utf8_lossy(cmd)
        );
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for filled in 0..buf.len() {
            match self.read_one_byte() {
                Some(b) => buf[filled] = b,
                None => {
                    return Err(InstrumentError::IncompleteResponse {
                        expected: buf.len(),
                        received: String::from_utf8_lossy(&buf[..filled]).into_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }
}

impl Drop for LoopbackInterface {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
