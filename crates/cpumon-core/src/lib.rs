//! cpumon-core — shared library for the cpumon telemetry collector.
//!
//! Provides:
//! - `value`, `entry`, `signals` — typed scalar cells and named signal
//!   entries with their JSON renderings
//! - `sample`, `pool` — the fixed sample pool and its hand-off queues
//! - `procfs`, `fs` — the `/proc/stat` counter source and its parsers,
//!   behind a mockable filesystem abstraction
//! - `sampler` — the producer thread: periodic snapshots and deltas
//! - `publisher` — the flush loop: percentages, payload, bounded retry
//! - `cursor`, `payload` — lazy value iteration streamed into the request
//! - `transport` — the ingestion endpoint contract and HTTP client

pub mod cursor;
pub mod entry;
pub mod fs;
pub mod payload;
pub mod pool;
pub mod procfs;
pub mod publisher;
pub mod sample;
pub mod sampler;
pub mod signals;
pub mod transport;
pub mod value;

pub use cursor::ValueCursor;
pub use entry::{Entry, EntryKind};
pub use fs::{FileSystem, MockFs, RealFs};
pub use pool::SamplePool;
pub use publisher::{Publisher, PublisherConfig};
pub use sample::Sample;
pub use sampler::{DeltaTracker, Sampler};
pub use transport::{HttpTransport, Outcome, Transport};
pub use value::{Stamp, Value};
