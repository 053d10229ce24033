//! Lazy value iteration over a batch of samples.
//!
//! The payload formatter consumes one flat sequence of cells: for each
//! sample its identity, its timestamp, then every measurement in index
//! order. The cursor is single-pass; a fresh one is constructed per
//! serialization.

use crate::sample::Sample;
use crate::value::Value;

#[derive(Clone, Copy)]
enum Field {
    Id,
    Ts,
    Measure(usize),
    Done,
}

/// Stateful cursor yielding one value cell at a time across sample
/// boundaries. The terminal state is idempotent: once exhausted, `next`
/// keeps returning `None`.
pub struct ValueCursor<'a> {
    samples: &'a [Box<Sample>],
    index: usize,
    field: Field,
}

impl<'a> ValueCursor<'a> {
    pub fn new(samples: &'a [Box<Sample>]) -> Self {
        Self { samples, index: 0, field: Field::Id }
    }
}

impl Iterator for ValueCursor<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        loop {
            let sample = match self.samples.get(self.index) {
                Some(sample) => sample,
                None => {
                    self.field = Field::Done;
                    return None;
                }
            };

            match self.field {
                Field::Id => {
                    self.field = Field::Ts;
                    return Some(Value::Stamp(sample.id));
                }
                Field::Ts => {
                    self.field = Field::Measure(0);
                    return Some(Value::Stamp(sample.ts));
                }
                Field::Measure(i) if i < sample.values.len() => {
                    self.field = Field::Measure(i + 1);
                    return Some(sample.values[i]);
                }
                Field::Measure(_) => {
                    // Sample exhausted, advance to the next one's identity.
                    self.index += 1;
                    self.field = Field::Id;
                }
                Field::Done => return None,
            }
        }
    }
}
