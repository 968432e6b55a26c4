//! Optional log of the raw communication with the controller.

use std::{
    fmt::Display,
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
};

use chrono::{DateTime, SecondsFormat, Utc};
use instrumentrs::InstrumentError;

/// Direction of a logged line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From host to controller.
    Sent,
    /// From controller to host.
    Received,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Sent => write!(f, "sent"),
            Direction::Received => write!(f, "received"),
        }
    }
}

/// One logged line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Whether the line was sent or received.
    pub direction: Direction,
    /// The raw text, line ending included.
    pub text: String,
    /// When the line was logged.
    pub timestamp: DateTime<Utc>,
}

/// Formats as `[direction] text timestamp`, with the line ending stripped from the text.
impl Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.direction,
            self.text.trim_end_matches(['\r', '\n']),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}

/// Append-only in-memory buffer of the communication.
///
/// Recording is a no-op while the log is disabled.
#[derive(Debug, Default)]
pub struct CommLog {
    enabled: bool,
    entries: Vec<LogEntry>,
}

impl CommLog {
    /// Create a new, empty log.
    pub fn new(enabled: bool) -> Self {
        CommLog {
            enabled,
            entries: Vec::new(),
        }
    }

    /// Whether lines are being recorded.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable recording. Entries recorded so far are kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Record a line, if enabled.
    pub fn record(&mut self, direction: Direction, text: &str) {
        if self.enabled {
            self.entries.push(LogEntry {
                direction,
                text: text.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    /// The entries recorded since the last flush.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Append all entries to a file, one line each, and clear the buffer.
    ///
    /// The file is created if it does not exist. Nothing is touched if the buffer is empty.
    /// On error the buffer is kept. Returns the number of lines written.
    pub fn flush_to(&mut self, path: impl AsRef<Path>) -> Result<usize, InstrumentError> {
        if self.entries.is_empty() {
            return Ok(0);
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            writeln!(writer, "{entry}")?;
        }
        writer.flush()?;

        let written = self.entries.len();
        self.entries.clear();
        tracing::debug!(lines = written, path = %path.as_ref().display(), "flushed communication log");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_log_records_nothing() {
        let mut log = CommLog::default();
        log.record(Direction::Sent, ":laser:set?\n");
        assert!(log.entries().is_empty());

        log.set_enabled(true);
        log.record(Direction::Sent, ":laser:set?\n");
        log.record(Direction::Received, "1000.00 cm-1\n");
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[1].direction, Direction::Received);
    }

    #[test]
    fn test_new_enabled_records() {
        let mut log = CommLog::new(true);
        assert!(log.is_enabled());
        log.record(Direction::Sent, ":scan:run 0\n");
        assert_eq!(log.entries().len(), 1);

        assert!(!CommLog::new(false).is_enabled());
    }

    #[test]
    fn test_entry_display() {
        let entry = LogEntry {
            direction: Direction::Sent,
            text: ":scan:run 1\n".to_string(),
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
        };
        assert_eq!(
            entry.to_string(),
            "[sent] :scan:run 1 1970-01-01T00:00:00.000000Z"
        );
    }
}
