//! A rust driver for a tunable quantum cascade laser (QCL) controller.
//!
//! The controller is driven over a serial line with SCPI-like commands (`:laser:set 1080.00`)
//! and answers every query with a reply of fixed width: the value, padded, followed by a unit
//! suffix. This driver translates typed parameter accesses into these commands, keeps a
//! snapshot of the last-known device state, and waits for scans to complete.
//!
//! Some parameters only exist in certain scan modes: the pause between steps is not available in
//! manual stepscan mode, and the step size only in the two stepscan modes. Such accesses are
//! never sent to the controller (it would hang or answer with garbage) and return `Ok(None)`.
//!
//! The controller is the source of truth: every `set` is confirmed by reading the value back,
//! and only values read back end up in the [`DeviceState`] snapshot.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use qcl_controller::{Param, PollOptions, Qcl, ScanMode, SerialInterfaceQcl};
//!
//! let interface = SerialInterfaceQcl::simple("/dev/ttyUSB0").unwrap();
//! let mut qcl = Qcl::try_new(interface).unwrap();
//!
//! println!("Wavenumber: {} cm-1", qcl.get_wavenumber().unwrap());
//! qcl.set(Param::Wavenumber, 1080.0).unwrap();
//!
//! qcl.set_scan_range(1000.0, 1100.0).unwrap();
//! qcl.set_scan_mode(ScanMode::ForwardSweep).unwrap();
//! qcl.scan_start().unwrap();
//! qcl.wait_for_scan(&PollOptions::default()).unwrap();
//! ```

#![warn(missing_docs)]

mod comm_log;
mod interface;
mod params;
mod poll;
pub mod sim;
mod state;

pub use comm_log::{CommLog, Direction, LogEntry};
pub use interface::{BAUD_RATE, READ_TIMEOUT, SerialInterfaceQcl};
pub use params::{ModeGate, Param, ParamDescriptor, ScanMode, Value, ValueKind};
pub use poll::{PollOptions, ScanOutcome, ScanProgress, ScanWatch};
pub use state::DeviceState;

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use instrumentrs::{InstrumentError, InstrumentInterface};
use measurements::Frequency;

/// A rust driver for the QCL controller.
///
/// The driver owns the interface. Clones share the interface, the state snapshot, and the
/// communication log, so that a clone can poll the controller from another thread. Every
/// exchange holds the interface for its full command and reply.
///
/// See the top-level documentation for an example on how to use this driver.
pub struct Qcl<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    state: Arc<Mutex<Arc<DeviceState>>>,
    log: Arc<Mutex<CommLog>>,
}

impl<T: InstrumentInterface> Qcl<T> {
    /// Create a new driver without talking to the controller.
    ///
    /// All parameters start out unknown, call [`Qcl::get_all`] to synchronize.
    ///
    /// # Arguments
    /// * `interface` - An instrument interface that implements the [`InstrumentInterface`] trait.
    pub fn new(interface: T) -> Self {
        let mut intf = interface;
        intf.set_terminator("\n");
        Qcl {
            interface: Arc::new(Mutex::new(intf)),
            state: Arc::new(Mutex::new(Arc::new(DeviceState::default()))),
            log: Arc::new(Mutex::new(CommLog::new(false))),
        }
    }

    /// Create a new driver and read all parameters from the controller.
    ///
    /// # Arguments
    /// * `interface` - An instrument interface that implements the [`InstrumentInterface`] trait.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut instrument = Self::new(interface);
        instrument.get_all()?;
        Ok(instrument)
    }

    /// The current snapshot of the device state.
    pub fn state(&self) -> Arc<DeviceState> {
        let state = self.state.lock().expect("Mutex should not be poisoned");
        Arc::clone(&state)
    }

    /// Read a parameter from the controller.
    ///
    /// Returns `Ok(None)` without talking to the controller if the parameter is not available
    /// in the cached scan mode. Otherwise the value read is stored in the state snapshot and
    /// returned.
    pub fn get(&mut self, param: Param) -> Result<Option<Value>, InstrumentError> {
        if !self.is_applicable(param) {
            tracing::debug!(%param, "skipping get, not available in current scan mode");
            return Ok(None);
        }
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        self.read_param(&mut *intf, param, true).map(Some)
    }

    /// Set a parameter and return the value the controller confirms.
    ///
    /// The value is checked against the range of the parameter before anything is sent.
    /// Read-only parameters cannot be set. If the parameter is not available in the cached scan
    /// mode, nothing is sent and `Ok(None)` is returned.
    ///
    /// # Arguments
    /// * `param` - The parameter to set.
    /// * `value` - The new value. Integer parameters are truncated, floats are rounded to the
    ///   decimals of the parameter before sending (`0.125` µs pulse width goes out as `0.12`).
    ///
    /// The returned value is what the controller reports, at the precision of its reply. A scan
    /// step of 100 cm⁻¹ or more only comes back with one decimal.
    pub fn set(&mut self, param: Param, value: f64) -> Result<Option<Value>, InstrumentError> {
        let desc = param.descriptor();
        desc.check_range(value)?;
        if !self.is_applicable(param) {
            tracing::debug!(%param, "skipping set, not available in current scan mode");
            return Ok(None);
        }
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        self.send(&mut *intf, &desc.set_command(value))?;
        self.read_param(&mut *intf, param, false).map(Some)
    }

    /// Read every parameter, in the order of [`Param::ALL`], and return the resulting snapshot.
    ///
    /// Parameters that are not available in the scan mode just read are skipped and keep
    /// their previous value.
    pub fn get_all(&mut self) -> Result<Arc<DeviceState>, InstrumentError> {
        for param in Param::ALL {
            self.get(param)?;
        }
        Ok(self.state())
    }

    /// Start a scan with the current scan settings.
    pub fn scan_start(&mut self) -> Result<(), InstrumentError> {
        tracing::info!("starting scan");
        self.sendcmd(":scan:run 1")
    }

    /// Stop the running scan.
    pub fn scan_stop(&mut self) -> Result<(), InstrumentError> {
        tracing::info!("stopping scan");
        self.sendcmd(":scan:run 0")
    }

    /// Move to the next wavenumber of a manual stepscan.
    pub fn step_next(&mut self) -> Result<(), InstrumentError> {
        self.sendcmd(":scan:step:next")
    }

    /// Close the interface to the controller.
    pub fn close(self) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.close()
    }

    /// Enable or disable the communication log.
    pub fn set_logging(&mut self, enabled: bool) {
        let mut log = self.log.lock().expect("Mutex should not be poisoned");
        log.set_enabled(enabled);
    }

    /// Whether the communication log is enabled.
    pub fn is_logging(&self) -> bool {
        let log = self.log.lock().expect("Mutex should not be poisoned");
        log.is_enabled()
    }

    /// A copy of the communication log entries recorded since the last flush.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        let log = self.log.lock().expect("Mutex should not be poisoned");
        log.entries().to_vec()
    }

    /// Append the communication log to a file and clear it.
    ///
    /// Returns the number of lines written.
    pub fn flush_log(&mut self, path: impl AsRef<Path>) -> Result<usize, InstrumentError> {
        let mut log = self.log.lock().expect("Mutex should not be poisoned");
        log.flush_to(path)
    }

    /// Get the wavenumber setpoint in cm⁻¹.
    pub fn get_wavenumber(&mut self) -> Result<f64, InstrumentError> {
        Ok(self.get_required(Param::Wavenumber)?.as_f64())
    }

    /// Set the wavenumber in cm⁻¹ and return the confirmed value.
    pub fn set_wavenumber(&mut self, wavenumber: f64) -> Result<f64, InstrumentError> {
        Ok(self.set_required(Param::Wavenumber, wavenumber)?.as_f64())
    }

    /// Get the wavenumber the laser currently emits at, in cm⁻¹.
    ///
    /// During a scan this moves, while [`Qcl::get_wavenumber`] stays at the setpoint.
    pub fn get_output_wavenumber(&mut self) -> Result<f64, InstrumentError> {
        Ok(self.get_required(Param::OutputWavenumber)?.as_f64())
    }

    /// Get the pulse repetition frequency.
    pub fn get_pulse_frequency(&mut self) -> Result<Frequency, InstrumentError> {
        let khz = self.get_required(Param::PulseFrequency)?.as_f64();
        Ok(Frequency::from_kilohertz(khz))
    }

    /// Set the pulse repetition frequency (1 to 100 kHz) and return the confirmed value.
    pub fn set_pulse_frequency(&mut self, freq: Frequency) -> Result<Frequency, InstrumentError> {
        let khz = self
            .set_required(Param::PulseFrequency, freq.as_kilohertz())?
            .as_f64();
        Ok(Frequency::from_kilohertz(khz))
    }

    /// Get the pulse width.
    pub fn get_pulse_width(&mut self) -> Result<Duration, InstrumentError> {
        let us = self.get_required(Param::PulseWidth)?.as_f64();
        duration_from_secs(us * 1e-6)
    }

    /// Set the pulse width (0.04 to 0.5 µs) and return the confirmed value.
    pub fn set_pulse_width(&mut self, width: Duration) -> Result<Duration, InstrumentError> {
        let us = self
            .set_required(Param::PulseWidth, width.as_secs_f64() * 1e6)?
            .as_f64();
        duration_from_secs(us * 1e-6)
    }

    /// Get the scan range as `(start, stop)` wavenumbers in cm⁻¹.
    pub fn get_scan_range(&mut self) -> Result<(f64, f64), InstrumentError> {
        let start = self.get_required(Param::ScanStart)?.as_f64();
        let stop = self.get_required(Param::ScanStop)?.as_f64();
        Ok((start, stop))
    }

    /// Set the scan range in cm⁻¹ and return the confirmed `(start, stop)`.
    ///
    /// Both values are checked before either is sent.
    pub fn set_scan_range(&mut self, start: f64, stop: f64) -> Result<(f64, f64), InstrumentError> {
        Param::ScanStart.descriptor().check_range(start)?;
        Param::ScanStop.descriptor().check_range(stop)?;
        let start = self.set_required(Param::ScanStart, start)?.as_f64();
        let stop = self.set_required(Param::ScanStop, stop)?.as_f64();
        Ok((start, stop))
    }

    /// Get the scan rate.
    pub fn get_scan_rate(&mut self) -> Result<f64, InstrumentError> {
        Ok(self.get_required(Param::ScanRate)?.as_f64())
    }

    /// Set the scan rate (1 to 6) and return the confirmed value.
    pub fn set_scan_rate(&mut self, rate: f64) -> Result<f64, InstrumentError> {
        Ok(self.set_required(Param::ScanRate, rate)?.as_f64())
    }

    /// Get the number of scan cycles that a scan runs.
    pub fn get_scan_cycles(&mut self) -> Result<u32, InstrumentError> {
        let cycles = self.get_required(Param::ScanCycles)?;
        to_count(Param::ScanCycles, cycles)
    }

    /// Set the number of scan cycles (1 to 10000) and return the confirmed value.
    pub fn set_scan_cycles(&mut self, cycles: u32) -> Result<u32, InstrumentError> {
        let cycles = self.set_required(Param::ScanCycles, f64::from(cycles))?;
        to_count(Param::ScanCycles, cycles)
    }

    /// Get the scan mode.
    pub fn get_scan_mode(&mut self) -> Result<ScanMode, InstrumentError> {
        mode_from_reply(self.get_required(Param::ScanMode)?)
    }

    /// Set the scan mode and return the confirmed mode.
    pub fn set_scan_mode(&mut self, mode: ScanMode) -> Result<ScanMode, InstrumentError> {
        let mode = self.set_required(Param::ScanMode, mode.as_value() as f64)?;
        mode_from_reply(mode)
    }

    /// Get the pause between steps, `None` in manual stepscan mode.
    pub fn get_scan_pause(&mut self) -> Result<Option<Duration>, InstrumentError> {
        self.get(Param::ScanPause)?
            .map(|v| duration_from_secs(v.as_f64()))
            .transpose()
    }

    /// Set the pause between steps (0 to 10 s) and return the confirmed value, `None` in manual
    /// stepscan mode.
    pub fn set_scan_pause(&mut self, pause: Duration) -> Result<Option<Duration>, InstrumentError> {
        self.set(Param::ScanPause, pause.as_secs_f64())?
            .map(|v| duration_from_secs(v.as_f64()))
            .transpose()
    }

    /// Get the step size in cm⁻¹, `None` outside of the stepscan modes.
    pub fn get_scan_step(&mut self) -> Result<Option<f64>, InstrumentError> {
        Ok(self.get(Param::ScanStep)?.map(|v| v.as_f64()))
    }

    /// Set the step size in cm⁻¹ and return the confirmed value, `None` outside of the stepscan
    /// modes.
    pub fn set_scan_step(&mut self, step: f64) -> Result<Option<f64>, InstrumentError> {
        Ok(self.set(Param::ScanStep, step)?.map(|v| v.as_f64()))
    }

    /// Get the working hours of the laser.
    pub fn get_working_hours(&mut self) -> Result<Duration, InstrumentError> {
        let hours = self.get_required(Param::WorkingHours)?.as_f64();
        duration_from_secs(hours * 3600.0)
    }

    /// Get the number of scan cycles left in the running scan. Zero when no scan runs.
    pub fn get_scan_count(&mut self) -> Result<u32, InstrumentError> {
        let count = self.get_required(Param::ScanCount)?;
        to_count(Param::ScanCount, count)
    }

    /// Whether the parameter may be accessed in the cached scan mode.
    fn is_applicable(&self, param: Param) -> bool {
        param.descriptor().gate.allows(self.state().mode())
    }

    /// Get a parameter that must be available.
    fn get_required(&mut self, param: Param) -> Result<Value, InstrumentError> {
        self.get(param)?.ok_or_else(|| not_available(param))
    }

    /// Set a parameter that must be available.
    fn set_required(&mut self, param: Param, value: f64) -> Result<Value, InstrumentError> {
        self.set(param, value)?.ok_or_else(|| not_available(param))
    }

    /// Send a command that has no reply.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        self.send(&mut *intf, cmd)
    }

    /// Send a command on an already locked interface and log it.
    fn send(&self, intf: &mut T, cmd: &str) -> Result<(), InstrumentError> {
        intf.sendcmd(cmd)?;
        tracing::debug!(command = cmd, "sent");
        self.record(Direction::Sent, &format!("{cmd}{}", intf.get_terminator()));
        Ok(())
    }

    /// Query a parameter on an already locked interface and store the value in a new snapshot.
    ///
    /// The query itself is only logged if `log_query` is set; the confirmation read of a `set`
    /// logs the set command instead.
    fn read_param(
        &self,
        intf: &mut T,
        param: Param,
        log_query: bool,
    ) -> Result<Value, InstrumentError> {
        let desc = param.descriptor();
        let query = desc.query_command();
        intf.sendcmd(&query)?;
        tracing::debug!(command = %query, "sent");
        if log_query {
            self.record(Direction::Sent, &format!("{query}{}", intf.get_terminator()));
        }

        let reply = intf.read_fixed(desc.reply_len).inspect_err(|e| {
            tracing::warn!(%param, error = %e, "no complete reply");
        })?;
        tracing::debug!(reply = ?reply, "received");
        self.record(Direction::Received, &reply);

        let value = desc.parse_reply(&reply)?;
        let mut state = self.state.lock().expect("Mutex should not be poisoned");
        *state = Arc::new(state.with(param, value));
        Ok(value)
    }

    /// Record a line in the communication log.
    fn record(&self, direction: Direction, text: &str) {
        let mut log = self.log.lock().expect("Mutex should not be poisoned");
        log.record(direction, text);
    }
}

impl<T: InstrumentInterface> Clone for Qcl<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            state: self.state.clone(),
            log: self.log.clone(),
        }
    }
}

/// The error for a gated parameter that a caller needs a value of.
fn not_available(param: Param) -> InstrumentError {
    InstrumentError::InvalidArgument(format!(
        "The {param} is not available in the current scan mode."
    ))
}

/// Convert a scan mode read from the controller. An unknown mode is a bad reply.
fn mode_from_reply(value: Value) -> Result<ScanMode, InstrumentError> {
    ScanMode::from_value(value.as_i64())
        .map_err(|_| InstrumentError::ResponseParseError(format!("scan mode {value}")))
}

/// Convert seconds read from the controller into a duration.
fn duration_from_secs(secs: f64) -> Result<Duration, InstrumentError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| InstrumentError::ResponseParseError(format!("{secs} s is not a duration")))
}

/// Convert a count read from the controller into an unsigned integer.
fn to_count(param: Param, value: Value) -> Result<u32, InstrumentError> {
    u32::try_from(value.as_i64())
        .map_err(|_| InstrumentError::ResponseParseError(format!("{param}: {value}")))
}
