//! Access to the `/proc/stat` CPU counter source.
//!
//! `parser` holds pure functions over the file text; `source` wraps the
//! re-readable file behind the `FileSystem` abstraction.

pub mod parser;
pub mod source;

pub use parser::{counter_column_count, cpu_row_count, parse_cpu_counters};
pub use source::StatSource;
