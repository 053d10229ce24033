//! Timestamped measurement records circulating through the pool.

use crate::value::{Stamp, Value};

/// One fully-populated snapshot of all counter values.
///
/// The value vector has a fixed width for the lifetime of the process:
/// counter rows times counters per row. Values start as raw unsigned deltas
/// and are rewritten in place to percentages by the publisher.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Record identity, stamped together with `ts` at fill time.
    pub id: Stamp,
    /// Measurement timestamp.
    pub ts: Stamp,
    /// Flat row-major array of per-(row, counter) values.
    pub values: Vec<Value>,
}

impl Sample {
    /// Creates a zeroed sample with the given fixed value count.
    pub fn new(value_count: usize) -> Self {
        Self {
            id: Stamp::default(),
            ts: Stamp::default(),
            values: vec![Value::Unsigned(0); value_count],
        }
    }

    /// Stamps both the identity and measurement timestamps.
    pub fn stamp(&mut self, ts: Stamp) {
        self.id = ts;
        self.ts = ts;
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}
