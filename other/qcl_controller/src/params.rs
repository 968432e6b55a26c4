//! The parameter table of the QCL controller.
//!
//! Every parameter the controller knows is described once, statically, by a [`ParamDescriptor`]:
//! its command keyword, the fixed length of its reply, how many suffix bytes to strip, its
//! numeric kind, its valid range, and the scan modes in which it may be used.

use std::fmt::Display;

use instrumentrs::InstrumentError;

/// Scan modes of the QCL controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanMode {
    /// The controller steps through the scan range by itself, pausing at every step.
    AutoStepscan = 1,
    /// The controller moves one step every time it receives a step command.
    ManualStepscan = 2,
    /// Continuous sweep from start to stop wavenumber.
    ForwardSweep = 3,
    /// Continuous sweep from start to stop wavenumber and back.
    ForwardBackwardSweep = 4,
}

impl ScanMode {
    /// Convert the integer the controller uses for a scan mode into a [`ScanMode`].
    pub fn from_value(value: i64) -> Result<Self, InstrumentError> {
        match value {
            1 => Ok(ScanMode::AutoStepscan),
            2 => Ok(ScanMode::ManualStepscan),
            3 => Ok(ScanMode::ForwardSweep),
            4 => Ok(ScanMode::ForwardBackwardSweep),
            _ => Err(InstrumentError::IntValueOutOfRange {
                value,
                min: 1,
                max: 4,
            }),
        }
    }

    /// The integer the controller uses for this scan mode.
    pub fn as_value(self) -> i64 {
        self as i64
    }
}

impl Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::AutoStepscan => write!(f, "Auto Stepscan"),
            ScanMode::ManualStepscan => write!(f, "Manual Stepscan"),
            ScanMode::ForwardSweep => write!(f, "Forward Sweep"),
            ScanMode::ForwardBackwardSweep => write!(f, "Forward/Backward Sweep"),
        }
    }
}

/// A value read from the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Integer parameters, e.g., the scan mode.
    Int(i64),
    /// Floating point parameters, e.g., the wavenumber.
    Float(f64),
}

impl Value {
    /// The value as a float, whatever its kind.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    /// The value as an integer. Floats are truncated.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Value::Int(v) => v,
            Value::Float(v) => v.trunc() as i64,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Numeric kind of a parameter on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Sent truncated to an integer, parsed as an integer.
    Int,
    /// Sent rounded to the given number of decimals, parsed as a float.
    Float {
        /// Decimals used when sending a value.
        decimals: usize,
    },
}

/// Scan modes in which a parameter can be queried and set.
///
/// Querying a parameter in a mode where the controller does not support it makes the
/// controller hang or answer with garbage, so such accesses are never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeGate {
    /// Always available.
    Always,
    /// Available in all modes except the listed ones.
    ExceptIn(&'static [ScanMode]),
    /// Only available in the listed modes.
    OnlyIn(&'static [ScanMode]),
}

impl ModeGate {
    /// Check whether the gate allows access in the given mode.
    ///
    /// A gated parameter is not allowed while the mode is unknown.
    pub fn allows(&self, mode: Option<ScanMode>) -> bool {
        match (self, mode) {
            (ModeGate::Always, _) => true,
            (_, None) => false,
            (ModeGate::ExceptIn(modes), Some(mode)) => !modes.contains(&mode),
            (ModeGate::OnlyIn(modes), Some(mode)) => modes.contains(&mode),
        }
    }
}

/// Static description of one controller parameter.
#[derive(Debug)]
pub struct ParamDescriptor {
    /// Human readable name.
    pub name: &'static str,
    /// Command keyword, e.g., `:laser:set`.
    pub command: &'static str,
    /// Exact number of bytes of a reply, suffix included.
    pub reply_len: usize,
    /// Number of trailing bytes (unit and line ending) to strip from a reply.
    pub suffix_len: usize,
    /// Numeric kind.
    pub kind: ValueKind,
    /// Closed range of valid values, `None` for read-only parameters.
    pub range: Option<(f64, f64)>,
    /// Scan modes in which the parameter is available.
    pub gate: ModeGate,
}

impl ParamDescriptor {
    /// Whether the parameter can be set.
    pub fn is_settable(&self) -> bool {
        self.range.is_some()
    }

    /// The query command, e.g., `:laser:set?`.
    pub fn query_command(&self) -> String {
        format!("{}?", self.command)
    }

    /// Check a value against the range of this parameter.
    ///
    /// Integer parameters are checked after truncation, as that is what is sent.
    pub fn check_range(&self, value: f64) -> Result<(), InstrumentError> {
        let Some((min, max)) = self.range else {
            return Err(InstrumentError::InvalidArgument(format!(
                "The {} is read-only and cannot be set.",
                self.name
            )));
        };
        match self.kind {
            ValueKind::Int => {
                let value = value.trunc();
                if !(min..=max).contains(&value) {
                    return Err(InstrumentError::IntValueOutOfRange {
                        value: value as i64,
                        min: min as i64,
                        max: max as i64,
                    });
                }
            }
            ValueKind::Float { .. } => {
                if !(min..=max).contains(&value) {
                    return Err(InstrumentError::FloatValueOutOfRange { value, min, max });
                }
            }
        }
        Ok(())
    }

    /// The set command for a value, e.g., `:laser:set 1080.00`.
    ///
    /// Floats are rounded to the decimals of the parameter, integers truncated. This does not
    /// check the range, see [`ParamDescriptor::check_range`].
    pub fn set_command(&self, value: f64) -> String {
        match self.kind {
            ValueKind::Int => format!("{} {}", self.command, value.trunc() as i64),
            ValueKind::Float { decimals } => format!("{} {:.*}", self.command, decimals, value),
        }
    }

    /// Parse a fixed-width reply into a value.
    ///
    /// The reply must have exactly the expected length. The suffix is stripped and the
    /// remaining padding trimmed before parsing.
    pub fn parse_reply(&self, reply: &str) -> Result<Value, InstrumentError> {
        let parse_err = || InstrumentError::ResponseParseError(reply.to_string());
        if reply.len() != self.reply_len {
            return Err(parse_err());
        }
        let payload = reply
            .get(..self.reply_len - self.suffix_len)
            .ok_or_else(parse_err)?
            .trim();
        match self.kind {
            ValueKind::Int => payload.parse::<i64>().map(Value::Int).map_err(|_| parse_err()),
            ValueKind::Float { .. } => match payload.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Value::Float(v)),
                _ => Err(parse_err()),
            },
        }
    }
}

/// All parameters of the QCL controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    /// Wavenumber setpoint in cm⁻¹.
    Wavenumber,
    /// Current output wavenumber in cm⁻¹, read-only.
    OutputWavenumber,
    /// Pulse repetition frequency in kHz.
    PulseFrequency,
    /// Pulse width in µs.
    PulseWidth,
    /// Scan start wavenumber in cm⁻¹.
    ScanStart,
    /// Scan stop wavenumber in cm⁻¹.
    ScanStop,
    /// Scan rate.
    ScanRate,
    /// Number of scan cycles to run.
    ScanCycles,
    /// Scan mode, see [`ScanMode`].
    ScanMode,
    /// Pause between steps in seconds. Not available in manual stepscan mode.
    ScanPause,
    /// Step size in cm⁻¹. Only available in the stepscan modes.
    ScanStep,
    /// Working hours of the laser, read-only.
    WorkingHours,
    /// Scan cycles remaining in the running scan, read-only.
    ScanCount,
}

impl Param {
    /// All parameters in the order in which they are read when synchronizing the whole state.
    ///
    /// The scan mode comes before the parameters that are gated on it.
    pub const ALL: [Param; 13] = [
        Param::Wavenumber,
        Param::OutputWavenumber,
        Param::PulseFrequency,
        Param::PulseWidth,
        Param::ScanStart,
        Param::ScanStop,
        Param::ScanRate,
        Param::ScanCycles,
        Param::ScanMode,
        Param::ScanPause,
        Param::ScanStep,
        Param::WorkingHours,
        Param::ScanCount,
    ];

    /// The static descriptor of this parameter.
    pub fn descriptor(self) -> &'static ParamDescriptor {
        &DESCRIPTORS[self as usize]
    }

    /// Find the parameter with the given command keyword.
    pub fn from_command(command: &str) -> Option<Self> {
        Param::ALL
            .into_iter()
            .find(|p| p.descriptor().command == command)
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor().name)
    }
}

const WN_RANGE: Option<(f64, f64)> = Some((980.04, 1244.99));

/// Indexed by `Param as usize`.
static DESCRIPTORS: [ParamDescriptor; 13] = [
    ParamDescriptor {
        name: "wavenumber",
        command: ":laser:set",
        reply_len: 13,
        suffix_len: 6,
        kind: ValueKind::Float { decimals: 2 },
        range: WN_RANGE,
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "output wavenumber",
        command: ":laser:pos",
        reply_len: 13,
        suffix_len: 6,
        kind: ValueKind::Float { decimals: 2 },
        range: None,
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "pulse frequency",
        command: ":pulse:freq",
        reply_len: 10,
        suffix_len: 5,
        kind: ValueKind::Float { decimals: 1 },
        range: Some((1.0, 100.0)),
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "pulse width",
        command: ":pulse:width",
        reply_len: 10,
        suffix_len: 6,
        kind: ValueKind::Float { decimals: 2 },
        range: Some((0.04, 0.5)),
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "scan start wavenumber",
        command: ":scan:start",
        reply_len: 13,
        suffix_len: 6,
        kind: ValueKind::Float { decimals: 2 },
        range: WN_RANGE,
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "scan stop wavenumber",
        command: ":scan:stop",
        reply_len: 13,
        suffix_len: 6,
        kind: ValueKind::Float { decimals: 2 },
        range: WN_RANGE,
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "scan rate",
        command: ":scan:rate",
        reply_len: 3,
        suffix_len: 2,
        kind: ValueKind::Float { decimals: 1 },
        range: Some((1.0, 6.0)),
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "scan cycles",
        command: ":scan:cycles",
        reply_len: 20,
        suffix_len: 2,
        kind: ValueKind::Float { decimals: 0 },
        range: Some((1.0, 10000.0)),
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "scan mode",
        command: ":scan:mode",
        reply_len: 3,
        suffix_len: 2,
        kind: ValueKind::Int,
        range: Some((1.0, 4.0)),
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "scan pause",
        command: ":scan:pause",
        reply_len: 9,
        suffix_len: 5,
        kind: ValueKind::Float { decimals: 2 },
        range: Some((0.0, 10.0)),
        gate: ModeGate::ExceptIn(&[ScanMode::ManualStepscan]),
    },
    ParamDescriptor {
        name: "scan step",
        command: ":scan:step",
        reply_len: 11,
        suffix_len: 6,
        kind: ValueKind::Float { decimals: 2 },
        range: Some((0.01, 264.95)),
        gate: ModeGate::OnlyIn(&[ScanMode::AutoStepscan, ScanMode::ManualStepscan]),
    },
    ParamDescriptor {
        name: "working hours",
        command: ":info:hhrs",
        reply_len: 11,
        suffix_len: 5,
        kind: ValueKind::Float { decimals: 1 },
        range: None,
        gate: ModeGate::Always,
    },
    ParamDescriptor {
        name: "scan count",
        command: ":scan:count",
        reply_len: 6,
        suffix_len: 2,
        kind: ValueKind::Int,
        range: None,
        gate: ModeGate::Always,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_order() {
        for (idx, param) in Param::ALL.iter().enumerate() {
            assert_eq!(*param as usize, idx);
            assert_eq!(Param::from_command(param.descriptor().command), Some(*param));
        }
        assert!(Param::ALL.iter().position(|p| *p == Param::ScanMode)
            < Param::ALL.iter().position(|p| *p == Param::ScanPause));
    }

    #[test]
    fn test_parse_reply_strips_suffix() {
        let desc = Param::Wavenumber.descriptor();
        assert_eq!(desc.parse_reply("1000.00 cm-1\n").unwrap(), Value::Float(1000.0));
        assert_eq!(desc.parse_reply(" 980.04 cm-1\n").unwrap(), Value::Float(980.04));
        assert_eq!(
            Param::ScanCount.descriptor().parse_reply("0003\r\n").unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_parse_reply_rejects_malformed() {
        let desc = Param::Wavenumber.descriptor();
        assert!(desc.parse_reply("1000.00 cm-1").is_err());
        assert!(desc.parse_reply("abcdefg cm-1\n").is_err());
        assert!(desc.parse_reply("    NaN cm-1\n").is_err());
        assert!(Param::ScanMode.descriptor().parse_reply("x\r\n").is_err());
    }

    #[test]
    fn test_set_command_formatting() {
        assert_eq!(
            Param::Wavenumber.descriptor().set_command(1080.0),
            ":laser:set 1080.00"
        );
        assert_eq!(Param::ScanMode.descriptor().set_command(2.7), ":scan:mode 2");
        assert_eq!(Param::ScanCycles.descriptor().set_command(10.0), ":scan:cycles 10");
        assert_eq!(
            Param::PulseWidth.descriptor().set_command(0.125),
            ":pulse:width 0.12"
        );
    }

    #[test]
    fn test_check_range() {
        let desc = Param::PulseWidth.descriptor();
        assert!(desc.check_range(0.04).is_ok());
        assert!(desc.check_range(0.5).is_ok());
        assert!(matches!(
            desc.check_range(0.6),
            Err(InstrumentError::FloatValueOutOfRange { .. })
        ));
        assert!(desc.check_range(f64::NAN).is_err());
        assert!(matches!(
            Param::ScanMode.descriptor().check_range(5.0),
            Err(InstrumentError::IntValueOutOfRange { value: 5, min: 1, max: 4 })
        ));
        assert!(matches!(
            Param::ScanCount.descriptor().check_range(1.0),
            Err(InstrumentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mode_gates() {
        let pause = Param::ScanPause.descriptor().gate;
        assert!(pause.allows(Some(ScanMode::AutoStepscan)));
        assert!(!pause.allows(Some(ScanMode::ManualStepscan)));
        assert!(!pause.allows(None));

        let step = Param::ScanStep.descriptor().gate;
        assert!(step.allows(Some(ScanMode::ManualStepscan)));
        assert!(!step.allows(Some(ScanMode::ForwardSweep)));
        assert!(!step.allows(Some(ScanMode::ForwardBackwardSweep)));

        assert!(Param::Wavenumber.descriptor().gate.allows(None));
    }
}
