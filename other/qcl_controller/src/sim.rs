//! A simulated QCL controller for tests and demos.
//!
//! [`QclSimulator`] implements [`InstrumentInterface`] and answers like the real controller:
//! set commands are stored, queries are answered with fixed-width replies including the unit
//! suffix, and a scan count sequence can be scripted. Clones share the same simulated device,
//! so a test can hand one clone to the driver and inspect the device through another.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
};

use instrumentrs::{InstrumentError, InstrumentInterface};

use crate::params::{Param, ParamDescriptor, Value, ValueKind};

#[derive(Debug)]
struct SimState {
    values: BTreeMap<Param, Value>,
    scan_counts: VecDeque<u32>,
    running: bool,
    steps: usize,
    received: Vec<String>,
    line: Vec<u8>,
    pending: VecDeque<u8>,
    unresponsive: bool,
}

/// A simulated QCL controller.
#[derive(Debug, Clone)]
pub struct QclSimulator {
    state: Arc<Mutex<SimState>>,
}

impl Default for QclSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl QclSimulator {
    /// A controller idling at 1000 cm⁻¹ in forward sweep mode.
    pub fn new() -> Self {
        let defaults = [
            (Param::Wavenumber, 1000.0),
            (Param::OutputWavenumber, 1000.0),
            (Param::PulseFrequency, 100.0),
            (Param::PulseWidth, 0.5),
            (Param::ScanStart, 1000.0),
            (Param::ScanStop, 1100.0),
            (Param::ScanRate, 1.0),
            (Param::ScanCycles, 1.0),
            (Param::ScanMode, 3.0),
            (Param::ScanPause, 0.5),
            (Param::ScanStep, 1.0),
            (Param::WorkingHours, 1234.5),
            (Param::ScanCount, 0.0),
        ];
        let values = defaults
            .into_iter()
            .map(|(p, v)| (p, to_value(p.descriptor(), v)))
            .collect();
        QclSimulator {
            state: Arc::new(Mutex::new(SimState {
                values,
                scan_counts: VecDeque::new(),
                running: false,
                steps: 0,
                received: Vec::new(),
                line: Vec::new(),
                pending: VecDeque::new(),
                unresponsive: false,
            })),
        }
    }

    /// Preset a parameter.
    pub fn with_value(self, param: Param, value: f64) -> Self {
        self.set_value(param, value);
        self
    }

    /// Script the replies to scan count queries. Once only one value is left, it is repeated.
    pub fn with_scan_counts(self, counts: Vec<u32>) -> Self {
        self.lock().scan_counts = counts.into();
        self
    }

    /// Change a parameter on the device, e.g., from the front panel.
    pub fn set_value(&self, param: Param, value: f64) {
        self.lock()
            .values
            .insert(param, to_value(param.descriptor(), value));
    }

    /// The current value of a parameter on the device.
    pub fn value(&self, param: Param) -> Option<Value> {
        self.lock().values.get(&param).copied()
    }

    /// Stop answering queries. Commands are still recorded.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.lock().unresponsive = unresponsive;
    }

    /// All command lines received so far, without terminator.
    pub fn received(&self) -> Vec<String> {
        self.lock().received.clone()
    }

    /// How often a parameter was queried.
    pub fn queries_of(&self, param: Param) -> usize {
        let query = param.descriptor().query_command();
        self.lock().received.iter().filter(|c| **c == query).count()
    }

    /// Whether a scan was started and not stopped.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Number of manual steps received.
    pub fn steps(&self) -> usize {
        self.lock().steps
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("Mutex should not be poisoned")
    }
}

impl SimState {
    fn handle_line(&mut self, line: &str) {
        self.received.push(line.to_string());
        match line.split_once(' ') {
            _ if line == ":scan:step:next" => {
                self.steps += 1;
                let step = self.value_f64(Param::ScanStep);
                let pos = self.value_f64(Param::OutputWavenumber);
                self.store(Param::OutputWavenumber, pos + step);
            }
            Some((":scan:run", arg)) => self.running = arg.trim() == "1",
            Some((cmd, arg)) => {
                let Some(param) = Param::from_command(cmd) else {
                    return;
                };
                if !param.descriptor().is_settable() {
                    return;
                }
                if let Ok(v) = arg.trim().parse::<f64>() {
                    self.store(param, v);
                    if param == Param::Wavenumber {
                        self.store(Param::OutputWavenumber, v);
                    }
                }
            }
            None => {
                let Some(param) = line.strip_suffix('?').and_then(Param::from_command) else {
                    return;
                };
                if self.unresponsive {
                    return;
                }
                if param == Param::ScanCount {
                    self.next_scan_count();
                }
                if let Some(value) = self.values.get(&param) {
                    let reply = format_reply(param, *value);
                    self.pending.extend(reply.into_bytes());
                }
            }
        }
    }

    fn next_scan_count(&mut self) {
        let count = if self.scan_counts.len() > 1 {
            self.scan_counts.pop_front()
        } else {
            self.scan_counts.front().copied()
        };
        if let Some(count) = count {
            self.values.insert(Param::ScanCount, Value::Int(i64::from(count)));
        }
    }

    fn store(&mut self, param: Param, value: f64) {
        self.values.insert(param, to_value(param.descriptor(), value));
    }

    fn value_f64(&self, param: Param) -> f64 {
        self.values.get(&param).map_or(0.0, |v| v.as_f64())
    }
}

impl InstrumentInterface for QclSimulator {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let mut state = self.lock();
        for &byte in data {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&state.line).into_owned();
                state.line.clear();
                state.handle_line(&line);
            } else {
                state.line.push(byte);
            }
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        let mut state = self.lock();
        if state.pending.len() < buf.len() {
            let received: Vec<u8> = state.pending.drain(..).collect();
            return Err(InstrumentError::IncompleteResponse {
                expected: buf.len(),
                received: String::from_utf8_lossy(&received).into_owned(),
            });
        }
        let len = buf.len();
        for (dst, src) in buf.iter_mut().zip(state.pending.drain(..len)) {
            *dst = src;
        }
        Ok(())
    }
}

fn to_value(desc: &ParamDescriptor, value: f64) -> Value {
    match desc.kind {
        ValueKind::Int => Value::Int(value.trunc() as i64),
        ValueKind::Float { .. } => Value::Float(value),
    }
}

/// Unit suffix and line ending the controller appends to a reply.
fn suffix(param: Param) -> &'static str {
    match param {
        Param::Wavenumber
        | Param::OutputWavenumber
        | Param::ScanStart
        | Param::ScanStop
        | Param::ScanStep => " cm-1\n",
        Param::PulseFrequency => " kHz\n",
        Param::PulseWidth => " usec\n",
        Param::ScanPause => " sec\n",
        Param::WorkingHours => " hrs\n",
        Param::ScanRate | Param::ScanCycles | Param::ScanMode | Param::ScanCount => "\r\n",
    }
}

/// Right-align the value in the payload field. Decimals are dropped until the value fits.
fn format_reply(param: Param, value: Value) -> String {
    let desc = param.descriptor();
    let width = desc.reply_len - desc.suffix_len;
    let payload = match (desc.kind, value) {
        (ValueKind::Int, v) => format!("{:0width$}", v.as_i64()),
        (ValueKind::Float { decimals }, v) => (0..=decimals)
            .rev()
            .map(|prec| format!("{:>width$.prec$}", v.as_f64()))
            .find(|s| s.len() <= width)
            .unwrap_or_else(|| format!("{:>width$.0}", v.as_f64())),
    };
    format!("{payload}{}", suffix(param))
}
