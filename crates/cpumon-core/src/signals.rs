//! Signal-set construction for the CPU counter source.
//!
//! Signal names combine a row name (`cpu`, `cpu0`, `cpu1`, ...) with a
//! counter name (`user`, `nice`, ...), giving `cpu_user`, `cpu0_user` and
//! so on. The schema sequence starts with the timestamp signal, followed by
//! every per-(row, counter) signal in row-major order — the same order the
//! value cursor walks sample measurements.

use crate::entry::Entry;

/// Kernel names for the `/proc/stat` time columns, in file order.
const COUNTER_NAMES: [&str; 10] = [
    "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal", "guest", "guest_nice",
];

/// Name of a counter row: index 0 is the aggregate across all CPUs.
pub fn row_name(index: usize) -> String {
    if index == 0 {
        "cpu".to_string()
    } else {
        format!("cpu{}", index - 1)
    }
}

/// Name of a counter column, synthesizing `timeN` past the known set.
pub fn counter_name(index: usize) -> String {
    match COUNTER_NAMES.get(index) {
        Some(name) => (*name).to_string(),
        None => format!("time{}", index),
    }
}

/// The synthetic record-identity signal. Not part of the schema sequence.
pub fn id_signal() -> Entry {
    Entry::identity("id")
}

/// Builds the schema sequence: the `ts` datetime signal followed by one
/// double signal per (row, counter) pair.
pub fn build_signals(row_count: usize, counter_count: usize) -> Vec<Entry> {
    let mut signals = Vec::with_capacity(1 + row_count * counter_count);
    signals.push(Entry::datetime("ts"));

    for row in 0..row_count {
        let row_name = row_name(row);
        for counter in 0..counter_count {
            signals.push(Entry::double(format!("{}_{}", row_name, counter_name(counter))));
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;

    #[test]
    fn test_row_names() {
        assert_eq!(row_name(0), "cpu");
        assert_eq!(row_name(1), "cpu0");
        assert_eq!(row_name(5), "cpu4");
    }

    #[test]
    fn test_counter_names() {
        assert_eq!(counter_name(0), "user");
        assert_eq!(counter_name(9), "guest_nice");
        assert_eq!(counter_name(10), "time10");
    }

    #[test]
    fn test_build_signals_shape() {
        let signals = build_signals(3, 10);
        assert_eq!(signals.len(), 1 + 30);

        assert_eq!(signals[0].name(), "ts");
        assert_eq!(signals[0].kind(), EntryKind::Datetime);

        assert_eq!(signals[1].name(), "cpu_user");
        assert_eq!(signals[1].kind(), EntryKind::Double);
        assert_eq!(signals[10].name(), "cpu_guest_nice");
        assert_eq!(signals[11].name(), "cpu0_user");
        assert_eq!(signals[30].name(), "cpu1_guest_nice");
    }
}
