//! Typed scalar values carried by samples and signal entries.

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp with nanosecond precision.
///
/// The derived ordering compares seconds first, then nanoseconds, which is
/// what the sampler uses to reject clock step-backs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp {
    /// Whole seconds since the Unix epoch.
    pub secs: i64,
    /// Nanosecond fraction, always below one second.
    pub nanos: u32,
}

impl Stamp {
    /// Returns the current wall-clock time.
    ///
    /// A clock before the Unix epoch collapses to the epoch itself; the
    /// sampler's monotonicity check discards such cycles anyway.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Millisecond part of the sub-second fraction.
    pub fn millis(&self) -> u32 {
        self.nanos / 1_000_000
    }
}

impl From<SystemTime> for Stamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => Stamp {
                secs: elapsed.as_secs() as i64,
                nanos: elapsed.subsec_nanos(),
            },
            Err(_) => Stamp::default(),
        }
    }
}

/// One typed scalar value.
///
/// Exactly one interpretation is valid per declared entry kind; the lenient
/// accessors below mirror how raw counters are reinterpreted while flowing
/// through the pipeline (unsigned deltas become doubles in place).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    Double(f64),
    Str(&'static str),
    Stamp(Stamp),
}

impl Value {
    pub fn truth(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn signed(&self) -> i64 {
        match self {
            Value::Signed(v) => *v,
            Value::Unsigned(v) => *v as i64,
            _ => 0,
        }
    }

    pub fn unsigned(&self) -> u64 {
        match self {
            Value::Unsigned(v) => *v,
            Value::Signed(v) => *v as u64,
            _ => 0,
        }
    }

    pub fn double(&self) -> f64 {
        match self {
            Value::Double(v) => *v,
            Value::Unsigned(v) => *v as f64,
            Value::Signed(v) => *v as f64,
            _ => 0.0,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Value::Str(s) => s,
            _ => "",
        }
    }

    pub fn stamp(&self) -> Stamp {
        match self {
            Value::Stamp(t) => *t,
            _ => Stamp::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_ordering() {
        let earlier = Stamp { secs: 100, nanos: 900_000_000 };
        let later = Stamp { secs: 101, nanos: 0 };
        assert!(earlier < later);

        let same_sec = Stamp { secs: 101, nanos: 1 };
        assert!(later < same_sec);
        assert!(same_sec <= same_sec);
    }

    #[test]
    fn test_stamp_millis() {
        let stamp = Stamp { secs: 0, nanos: 123_456_789 };
        assert_eq!(stamp.millis(), 123);
    }

    #[test]
    fn test_unsigned_reinterpretation() {
        assert_eq!(Value::Unsigned(42).unsigned(), 42);
        assert_eq!(Value::Unsigned(42).signed(), 42);
        assert_eq!(Value::Unsigned(7).double(), 7.0);
        assert_eq!(Value::Double(1.5).unsigned(), 0);
    }
}
