//! Snapshot of the last-known state of the controller.

use std::{collections::BTreeMap, fmt::Display};

use crate::params::{Param, ScanMode, Value};

/// Immutable snapshot of the last value read for every parameter.
///
/// A parameter that was never read successfully is absent. Snapshots are never changed in
/// place: [`DeviceState::with`] returns a new one, which the driver then swaps in as a whole.
/// Whoever holds a snapshot therefore never sees a half-updated state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    values: BTreeMap<Param, Value>,
}

impl DeviceState {
    /// A new snapshot with `param` set to `value`, all other values copied over.
    pub fn with(&self, param: Param, value: Value) -> Self {
        let mut values = self.values.clone();
        values.insert(param, value);
        DeviceState { values }
    }

    /// The last value read for a parameter, if any.
    pub fn get(&self, param: Param) -> Option<Value> {
        self.values.get(&param).copied()
    }

    /// The last scan mode read, if it was read and is a valid mode.
    pub fn mode(&self) -> Option<ScanMode> {
        self.get(Param::ScanMode)
            .and_then(|v| ScanMode::from_value(v.as_i64()).ok())
    }

    /// Whether a value is known for the parameter.
    pub fn is_known(&self, param: Param) -> bool {
        self.values.contains_key(&param)
    }

    /// Iterate over all known values in declaration order of the parameters.
    pub fn iter(&self) -> impl Iterator<Item = (Param, Value)> + '_ {
        self.values.iter().map(|(p, v)| (*p, *v))
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for param in Param::ALL {
            match self.get(param) {
                Some(value) => writeln!(f, "{param}: {value}")?,
                None => writeln!(f, "{param}: unknown")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_leaves_previous_untouched() {
        let empty = DeviceState::default();
        let one = empty.with(Param::Wavenumber, Value::Float(1000.0));
        assert!(!empty.is_known(Param::Wavenumber));
        assert_eq!(one.get(Param::Wavenumber), Some(Value::Float(1000.0)));

        let two = one.with(Param::ScanMode, Value::Int(2));
        assert_eq!(two.mode(), Some(ScanMode::ManualStepscan));
        assert_eq!(one.mode(), None);
        assert_eq!(two.iter().count(), 2);
    }

    #[test]
    fn test_display_lists_unknown() {
        let state = DeviceState::default().with(Param::ScanCount, Value::Int(0));
        let text = state.to_string();
        assert!(text.contains("scan count: 0"));
        assert!(text.contains("wavenumber: unknown"));
    }
}
