//! Producer side of the pipeline: the sampling thread.
//!
//! The sampler sleeps for a fixed period, snapshots the counter source,
//! fills an empty sample from the pool, turns the raw counters into deltas
//! against the previous cycle, and publishes the finished sample to the
//! full queue. Every transient fault (clock regression, short read, short
//! parse) discards the cycle and retries on the next period; none of them
//! escalate past the loop iteration.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::pool::SamplePool;
use crate::procfs::{StatSource, parse_cpu_counters};
use crate::sample::Sample;
use crate::value::{Stamp, Value};

/// Double-buffered raw-counter snapshots for delta computation.
///
/// Two preallocated halves indexed by a toggling parity bit: one holds the
/// previous cycle's raw counters while the other receives the current
/// cycle's, so the subtraction never reads the snapshot it is writing.
pub struct DeltaTracker {
    snapshots: [Vec<u64>; 2],
    previous: usize,
}

impl DeltaTracker {
    /// Both halves start zeroed, so the first cycle's delta equals the raw
    /// counters (idle time since boot dominates it; it is published as-is).
    pub fn new(value_count: usize) -> Self {
        Self {
            snapshots: [vec![0; value_count], vec![0; value_count]],
            previous: 0,
        }
    }

    /// Snapshots the sample's raw counters into the spare half, rewrites the
    /// sample in place to the delta against the previous snapshot, then
    /// makes the new snapshot the previous one.
    ///
    /// Deltas use wrapping subtraction: counters are monotonic within a
    /// boot, so a regression shows up as transient noise and is not
    /// corrected.
    pub fn advance(&mut self, sample: &mut Sample) {
        let next = 1 - self.previous;

        for (slot, value) in self.snapshots[next].iter_mut().zip(&sample.values) {
            *slot = value.unsigned();
        }

        for (value, old) in sample.values.iter_mut().zip(&self.snapshots[self.previous]) {
            *value = Value::Unsigned(value.unsigned().wrapping_sub(*old));
        }

        self.previous = next;
    }
}

/// The sampling thread's long-lived state.
pub struct Sampler<F: FileSystem> {
    source: StatSource<F>,
    pool: Arc<SamplePool>,
    period: Duration,
    expected_values: usize,
    tracker: DeltaTracker,
    clock: fn() -> Stamp,
}

impl<F: FileSystem> Sampler<F> {
    pub fn new(
        source: StatSource<F>,
        pool: Arc<SamplePool>,
        period: Duration,
        value_count: usize,
    ) -> Self {
        Self {
            source,
            pool,
            period,
            expected_values: value_count,
            tracker: DeltaTracker::new(value_count),
            clock: Stamp::now,
        }
    }

    /// Replaces the wall clock, like `MockFs` replaces the counter source.
    pub fn with_clock(mut self, clock: fn() -> Stamp) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the sampling loop until a pool stop is requested.
    pub fn run(mut self) {
        debug!("sampler thread started");

        let mut last_ts = Stamp::default();
        // A buffer acquired but not yet published. It survives discarded
        // cycles and is refilled on the next one, so a short parse never
        // shrinks the pool.
        let mut held: Option<Box<Sample>> = None;

        while !self.pool.stop_requested() {
            thread::sleep(self.period);

            // Reject wall-clock step-backs so the published time series
            // stays strictly increasing.
            let ts = (self.clock)();
            if ts <= last_ts {
                warn!("current time not past previous sample, discarding cycle");
                continue;
            }

            if let Err(e) = self.source.refresh() {
                warn!(
                    "failed to read {}: {}; discarding cycle",
                    self.source.path().display(),
                    e
                );
                continue;
            }

            last_ts = ts;

            if held.is_none() {
                match self.pool.acquire_empty() {
                    Some(sample) => {
                        debug!("acquired empty sample");
                        held = Some(sample);
                    }
                    // Stop was requested while waiting for a buffer.
                    None => break,
                }
            }

            let Some(sample) = held.as_mut() else { break };

            sample.stamp(ts);
            let parsed =
                parse_cpu_counters(self.source.contents(), self.expected_values, &mut sample.values);
            debug!("parsed {} counter values", parsed);
            if parsed != self.expected_values {
                warn!(
                    "expected {} counter values, got {}; discarding cycle",
                    self.expected_values, parsed
                );
                continue;
            }

            self.tracker.advance(sample);

            if let Some(sample) = held.take() {
                self.pool.release_to_full(sample);
                debug!("produced full sample");
            }
        }

        // Keep the pool whole across shutdown: an unfinished buffer goes
        // back to the empty queue instead of being dropped.
        if let Some(sample) = held.take() {
            self.pool.release_many_to_empty(vec![sample]);
        }

        debug!("sampler thread finished");
    }
}
