//! Consumer side of the pipeline: the periodic flush loop.
//!
//! On a fixed schedule the publisher drains the full queue, converts raw
//! counter deltas to per-row percentages, streams the batch into a signals
//! request, and submits it. Submission failures drop the data, never the
//! buffers: every drained sample is returned to the empty queue whether or
//! not the publish succeeded.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cursor::ValueCursor;
use crate::entry::Entry;
use crate::payload::format_request;
use crate::pool::SamplePool;
use crate::transport::{Outcome, Transport};
use crate::value::Value;

/// Granularity of stop-flag checks while sleeping between flushes.
const STOP_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Flush scheduling and retry policy.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Period between flush cycles.
    pub flush_period: Duration,
    /// Total wait after a transient submission failure before retrying.
    pub retry_window: Duration,
    /// Checkpoint interval within the retry window.
    pub retry_check: Duration,
    /// Empty-queue occupancy at or below which a pending retry is abandoned
    /// so the sampler is not starved of buffers.
    pub low_water: usize,
}

/// Converts raw unsigned deltas to percentages, row by row.
///
/// Each row of `row_width` counters is rewritten as `100 * value / row_sum`.
/// A row whose counters are all zero yields all-zero percentages rather
/// than a division fault.
pub fn convert_deltas_to_percentages(values: &mut [Value], row_width: usize) {
    if row_width == 0 {
        return;
    }

    for row in values.chunks_mut(row_width) {
        let sum: u64 = row.iter().map(|value| value.unsigned()).sum();

        for value in row.iter_mut() {
            let fraction = if sum == 0 {
                0.0
            } else {
                value.unsigned() as f64 / sum as f64
            };
            *value = Value::Double(fraction * 100.0);
        }
    }
}

/// The flush loop's long-lived state. Runs on the main thread.
pub struct Publisher<T: Transport> {
    pool: Arc<SamplePool>,
    transport: T,
    partner_id: String,
    signal_set_id: String,
    id_signal: Entry,
    signals: Vec<Entry>,
    row_width: usize,
    config: PublisherConfig,
    schema_sent: bool,
}

impl<T: Transport> Publisher<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<SamplePool>,
        transport: T,
        partner_id: impl Into<String>,
        signal_set_id: impl Into<String>,
        id_signal: Entry,
        signals: Vec<Entry>,
        row_width: usize,
        config: PublisherConfig,
    ) -> Self {
        Self {
            pool,
            transport,
            partner_id: partner_id.into(),
            signal_set_id: signal_set_id.into(),
            id_signal,
            signals,
            row_width,
            config,
            schema_sent: false,
        }
    }

    /// Runs flush cycles on an absolute-deadline schedule until a stop is
    /// requested. The deadline is recomputed right after waking, so
    /// processing time does not push the schedule.
    pub fn run(&mut self) {
        let mut deadline = Instant::now() + self.config.flush_period;

        loop {
            if !self.sleep_until(deadline) {
                break;
            }
            deadline = Instant::now() + self.config.flush_period;

            self.flush_once();
        }

        debug!("publisher loop finished");
    }

    /// Sleeps until the deadline in stop-checking steps. Returns `false`
    /// when a stop was requested.
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.pool.stop_requested() {
                return false;
            }

            let now = Instant::now();
            if now >= deadline {
                return true;
            }

            thread::sleep((deadline - now).min(STOP_CHECK_PERIOD));
        }
    }

    /// Drains and publishes one batch, if any samples are pending.
    pub fn flush_once(&mut self) {
        let mut batch = self.pool.drain_full();
        if batch.is_empty() {
            return;
        }

        debug!("flushing {} samples", batch.len());

        for sample in &mut batch {
            convert_deltas_to_percentages(&mut sample.values, self.row_width);
        }

        let schema = if self.schema_sent {
            None
        } else {
            Some(self.signals.as_slice())
        };

        let mut request = String::new();
        format_request(
            &self.partner_id,
            &self.signal_set_id,
            schema,
            &self.id_signal,
            &self.signals,
            ValueCursor::new(&batch),
            &mut request,
        );

        if self.submit_with_retry(&request) {
            // Never resend the schema after the first accepted request.
            self.schema_sent = true;
            info!("published {} samples", batch.len());
        } else {
            warn!("batch of {} samples dropped", batch.len());
        }

        // Recycle the buffers regardless of the submission outcome.
        self.pool.release_many_to_empty(batch);
    }

    /// Submits the request, retrying once after the retry window for
    /// transient network failures. Returns `true` on acceptance.
    fn submit_with_retry(&self, request: &str) -> bool {
        let mut retried = false;

        loop {
            debug!("submitting signals request ({} bytes)", request.len());

            match self.transport.submit(request) {
                Outcome::Ok => {
                    debug!("signals request succeeded");
                    return true;
                }
                Outcome::Network(reason) if !retried => {
                    warn!(
                        "signals request failed ({}), retrying in {} seconds",
                        reason,
                        self.config.retry_window.as_secs()
                    );
                    if !self.wait_for_retry() {
                        return false;
                    }
                    retried = true;
                }
                Outcome::Network(reason) => {
                    warn!(
                        "signals request failed again after retry ({}), dropping",
                        reason
                    );
                    return false;
                }
                outcome => {
                    warn!("signals request not accepted ({}), dropping", outcome);
                    return false;
                }
            }
        }
    }

    /// Waits out the retry window in checkpoints, re-checking empty-queue
    /// occupancy. Returns `false` if the retry must be abandoned because
    /// buffers are running low or a stop was requested.
    fn wait_for_retry(&self) -> bool {
        let mut remaining = self.config.retry_window;

        while !remaining.is_zero() {
            let step = remaining.min(self.config.retry_check);
            thread::sleep(step);
            remaining = remaining.saturating_sub(step);

            if self.pool.stop_requested() {
                return false;
            }

            let empty = self.pool.empty_len();
            debug!("empty samples available: {}", empty);
            if empty <= self.config.low_water {
                warn!("number of empty samples too low, abandoning retry");
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use crate::signals::{build_signals, id_signal};
    use crate::value::Stamp;
    use std::sync::Mutex;

    /// Transport double recording submitted bodies and replaying scripted
    /// outcomes.
    struct ScriptedTransport {
        outcomes: Mutex<Vec<Outcome>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Outcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for &ScriptedTransport {
        fn submit(&self, body: &str) -> Outcome {
            self.requests.lock().unwrap().push(body.to_string());
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Outcome::Ok
            } else {
                outcomes.remove(0)
            }
        }
    }

    fn test_config() -> PublisherConfig {
        PublisherConfig {
            flush_period: Duration::from_millis(10),
            retry_window: Duration::from_millis(20),
            retry_check: Duration::from_millis(5),
            low_water: 0,
        }
    }

    fn publisher<'a>(
        pool: Arc<SamplePool>,
        transport: &'a ScriptedTransport,
        row_width: usize,
        config: PublisherConfig,
    ) -> Publisher<&'a ScriptedTransport> {
        let rows = pool_rows(&pool, row_width);
        Publisher::new(
            pool,
            transport,
            "partner",
            "signal-set",
            id_signal(),
            build_signals(rows, row_width),
            row_width,
            config,
        )
    }

    fn pool_rows(pool: &SamplePool, row_width: usize) -> usize {
        // All pool samples share one width; peek it via a round trip.
        let sample = pool.acquire_empty().unwrap();
        let rows = sample.value_count() / row_width;
        pool.release_many_to_empty(vec![sample]);
        rows
    }

    fn fill_full(pool: &SamplePool, count: usize, values: &[u64]) {
        for secs in 0..count as i64 {
            let mut sample = pool.acquire_empty().unwrap();
            sample.stamp(Stamp { secs: 1700000000 + secs, nanos: 0 });
            for (slot, value) in sample.values.iter_mut().zip(values) {
                *slot = Value::Unsigned(*value);
            }
            pool.release_to_full(sample);
        }
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let mut values: Vec<Value> =
            [4u64, 2, 1, 0].iter().map(|v| Value::Unsigned(*v)).collect();
        convert_deltas_to_percentages(&mut values, 4);

        let doubles: Vec<f64> = values.iter().map(|v| v.double()).collect();
        let sum: f64 = doubles.iter().sum();
        assert!((sum - 100.0).abs() < 1e-9);

        // Scenario from two snapshots [10,5,3,2] -> [14,7,4,2]: delta
        // [4,2,1,0], percentages 57.14 / 28.57 / 14.29 / 0.00.
        assert!((doubles[0] - 57.14).abs() < 0.005);
        assert!((doubles[1] - 28.57).abs() < 0.005);
        assert!((doubles[2] - 14.29).abs() < 0.005);
        assert_eq!(doubles[3], 0.0);
    }

    #[test]
    fn test_zero_row_converts_to_zeros() {
        let mut values = vec![Value::Unsigned(0); 4];
        convert_deltas_to_percentages(&mut values, 4);
        for value in &values {
            assert_eq!(*value, Value::Double(0.0));
        }
    }

    #[test]
    fn test_rows_normalize_independently() {
        let mut values: Vec<Value> =
            [1u64, 1, 3, 1].iter().map(|v| Value::Unsigned(*v)).collect();
        convert_deltas_to_percentages(&mut values, 2);
        assert_eq!(values[0], Value::Double(50.0));
        assert_eq!(values[2], Value::Double(75.0));
    }

    #[test]
    fn test_flush_publishes_and_recycles() {
        let pool = Arc::new(SamplePool::new(4, 4));
        let transport = ScriptedTransport::new(vec![Outcome::Ok]);
        let mut publisher = publisher(pool.clone(), &transport, 4, test_config());

        fill_full(&pool, 2, &[4, 2, 1, 0]);
        publisher.flush_once();

        assert_eq!(transport.requests.lock().unwrap().len(), 1);
        assert_eq!(pool.empty_len(), pool.capacity());
        assert_eq!(pool.full_len(), 0);
    }

    #[test]
    fn test_schema_sent_only_once() {
        let pool = Arc::new(SamplePool::new(4, 4));
        let transport = ScriptedTransport::new(vec![Outcome::Ok, Outcome::Ok]);
        let mut publisher = publisher(pool.clone(), &transport, 4, test_config());

        fill_full(&pool, 1, &[1, 2, 3, 4]);
        publisher.flush_once();
        fill_full(&pool, 1, &[1, 2, 3, 4]);
        publisher.flush_once();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("\"schema\""));
        assert!(!requests[1].contains("\"schema\""));
    }

    #[test]
    fn test_schema_resent_after_failure() {
        let pool = Arc::new(SamplePool::new(4, 4));
        let transport =
            ScriptedTransport::new(vec![Outcome::Server("HTTP 500".into()), Outcome::Ok]);
        let mut publisher = publisher(pool.clone(), &transport, 4, test_config());

        fill_full(&pool, 1, &[1, 2, 3, 4]);
        publisher.flush_once();
        fill_full(&pool, 1, &[1, 2, 3, 4]);
        publisher.flush_once();

        // The first request never succeeded, so the schema goes out again.
        let requests = transport.requests.lock().unwrap();
        assert!(requests[0].contains("\"schema\""));
        assert!(requests[1].contains("\"schema\""));
    }

    #[test]
    fn test_network_failure_retries_then_drops() {
        let pool = Arc::new(SamplePool::new(4, 4));
        let transport = ScriptedTransport::new(vec![
            Outcome::Network("connect refused".into()),
            Outcome::Network("connect refused".into()),
        ]);
        let mut publisher = publisher(pool.clone(), &transport, 4, test_config());

        fill_full(&pool, 2, &[1, 2, 3, 4]);
        publisher.flush_once();

        // One retry after the window, then the batch is dropped; the
        // buffers still return to the empty queue.
        assert_eq!(transport.requests.lock().unwrap().len(), 2);
        assert_eq!(pool.empty_len(), pool.capacity());
    }

    #[test]
    fn test_permanent_failure_does_not_retry() {
        let pool = Arc::new(SamplePool::new(4, 4));
        let transport = ScriptedTransport::new(vec![Outcome::Location("redirect".into())]);
        let mut publisher = publisher(pool.clone(), &transport, 4, test_config());

        fill_full(&pool, 1, &[1, 2, 3, 4]);
        publisher.flush_once();

        assert_eq!(transport.requests.lock().unwrap().len(), 1);
        assert_eq!(pool.empty_len(), pool.capacity());
    }

    #[test]
    fn test_retry_abandoned_at_low_water() {
        let pool = Arc::new(SamplePool::new(4, 4));
        let transport = ScriptedTransport::new(vec![Outcome::Network("unreachable".into())]);
        let mut config = test_config();
        // Empty occupancy after draining everything is 0, which is at the
        // low-water mark, so the retry is abandoned at the first checkpoint.
        config.low_water = 1;
        config.retry_window = Duration::from_secs(60);
        let mut publisher = publisher(pool.clone(), &transport, 4, config);

        fill_full(&pool, 4, &[1, 2, 3, 4]);
        let start = Instant::now();
        publisher.flush_once();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
        assert_eq!(pool.empty_len(), pool.capacity());
    }

    #[test]
    fn test_flush_skips_when_no_full_samples() {
        let pool = Arc::new(SamplePool::new(2, 4));
        let transport = ScriptedTransport::new(Vec::new());
        let mut publisher = publisher(pool, &transport, 4, test_config());

        publisher.flush_once();
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_serialized_order_matches_drain_order() {
        let pool = Arc::new(SamplePool::new(3, 4));
        let transport = ScriptedTransport::new(vec![Outcome::Ok]);
        let mut publisher = publisher(pool.clone(), &transport, 4, test_config());

        fill_full(&pool, 3, &[1, 2, 3, 4]);
        publisher.flush_once();

        let requests = transport.requests.lock().unwrap();
        let first = requests[0].find("\"01700000000\"").unwrap();
        let second = requests[0].find("\"01700000001\"").unwrap();
        let third = requests[0].find("\"01700000002\"").unwrap();
        assert!(first < second && second < third);
    }
}
