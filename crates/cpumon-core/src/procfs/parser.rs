//! Parsers for `/proc/stat` CPU time counters.
//!
//! These are pure functions over the file text, designed to be testable
//! with string inputs. The file starts with an aggregate `cpu` row followed
//! by one `cpuN` row per core; each row carries a space-separated list of
//! decimal time counters after the prefix.

use crate::value::Value;

/// Counts the leading `cpu`-prefixed rows (the aggregate row plus one row
/// per core). Parsing stops at the first row with a different prefix.
pub fn cpu_row_count(content: &str) -> usize {
    content
        .lines()
        .take_while(|line| line.starts_with("cpu"))
        .count()
}

/// Counts the numeric counter columns in the aggregate `cpu ` row.
///
/// Returns zero if the row is missing, which callers treat as an unusable
/// counter source.
pub fn counter_column_count(content: &str) -> usize {
    content
        .lines()
        .find(|line| line.starts_with("cpu "))
        .map(|line| {
            line.split_whitespace()
                .skip(1)
                .take_while(|field| field.parse::<u64>().is_ok())
                .count()
        })
        .unwrap_or(0)
}

/// Parses raw counters from the `cpu`-prefixed rows into `out` in row-major
/// order, stopping once `expected` values have been written or a non-CPU row
/// is reached. Returns the number of values written; a short count means the
/// source changed shape and the cycle must be discarded.
pub fn parse_cpu_counters(content: &str, expected: usize, out: &mut [Value]) -> usize {
    let mut written = 0;

    for line in content.lines().take_while(|line| line.starts_with("cpu")) {
        for field in line.split_whitespace().skip(1) {
            let counter: u64 = match field.parse() {
                Ok(value) => value,
                Err(_) => return written,
            };

            if written >= expected {
                return written;
            }

            out[written] = Value::Unsigned(counter);
            written += 1;
        }
    }

    written
}
