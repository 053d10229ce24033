//! cpumond - CPU utilization telemetry daemon.
//!
//! Samples `/proc/stat` on a fixed period, computes per-interval deltas on a
//! dedicated thread, and periodically pushes batched percentage samples to a
//! signals ingestion API from the main thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use cpumon_core::fs::RealFs;
use cpumon_core::procfs::{StatSource, counter_column_count, cpu_row_count};
use cpumon_core::publisher::{Publisher, PublisherConfig};
use cpumon_core::sampler::Sampler;
use cpumon_core::signals::{build_signals, id_signal};
use cpumon_core::transport::HttpTransport;
use cpumon_core::SamplePool;

/// CPU utilization telemetry daemon.
#[derive(Parser)]
#[command(name = "cpumond", about = "CPU utilization telemetry daemon", version)]
struct Args {
    /// Base URL of the signals ingestion API.
    #[arg(long, env = "CPUMON_API_HOST")]
    api_host: String,

    /// Access token for the ingestion API.
    #[arg(long, env = "CPUMON_API_TOKEN", hide_env_values = true)]
    api_token: String,

    /// Partner identifier sent with every request.
    #[arg(long, env = "CPUMON_PARTNER_ID")]
    partner_id: String,

    /// Signal set identifier sent with every request.
    #[arg(long, env = "CPUMON_SIGNAL_SET_ID")]
    signal_set_id: String,

    /// Sampling period in seconds.
    #[arg(short, long, default_value = "12")]
    interval: u64,

    /// Flush period in seconds.
    #[arg(short, long, default_value = "60")]
    flush_interval: u64,

    /// Retry window after a transient publish failure, in seconds.
    #[arg(long, default_value = "20")]
    retry_window: u64,

    /// Path to the CPU counter source (for testing/mocking).
    #[arg(long, default_value = "/proc/stat")]
    stat_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Interval between retry checkpoints while waiting out the retry window.
const RETRY_CHECK_SECS: u64 = 5;

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("cpumond={}", level).parse().unwrap())
        .add_directive(format!("cpumon_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("cpumond {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, flush={}s, source={}",
        args.interval, args.flush_interval, args.stat_path
    );

    if args.interval == 0 || args.flush_interval == 0 {
        error!("interval and flush-interval must be positive");
        std::process::exit(1);
    }

    // Startup faults are fatal: nothing below is recoverable and no thread
    // has been started yet.
    let source = match StatSource::open(RealFs::new(), &args.stat_path) {
        Ok(source) => source,
        Err(e) => {
            error!("failed to open {}: {}", args.stat_path, e);
            std::process::exit(1);
        }
    };

    let rows = cpu_row_count(source.contents());
    let counters = counter_column_count(source.contents());
    if rows == 0 || counters == 0 {
        error!("unexpected format in {}", args.stat_path);
        std::process::exit(1);
    }

    let value_count = rows * counters;
    info!(
        "Counter source: {} rows x {} counters = {} values per sample",
        rows, counters, value_count
    );

    let transport = match HttpTransport::new(&args.api_host, &args.api_token) {
        Ok(transport) => transport,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Publishing to {}", transport.endpoint());

    // Size the pool for one hour of samples; backpressure throttles the
    // sampler once the publisher stops returning buffers.
    let pool_size = (3600 / args.interval).max(1) as usize;
    let low_water = pool_size / 10;
    let pool = Arc::new(SamplePool::new(pool_size, value_count));
    info!("Sample pool: {} buffers, low-water mark {}", pool_size, low_water);

    // Setup graceful shutdown
    {
        let pool = pool.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            pool.request_stop();
        }) {
            warn!("Failed to set Ctrl-C handler: {}", e);
        }
    }

    let sampler = Sampler::new(
        source,
        pool.clone(),
        Duration::from_secs(args.interval),
        value_count,
    );

    let sampler_thread = match thread::Builder::new()
        .name("sampler".to_string())
        .spawn(move || sampler.run())
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to start sampler thread: {}", e);
            std::process::exit(1);
        }
    };

    let mut publisher = Publisher::new(
        pool.clone(),
        transport,
        args.partner_id,
        args.signal_set_id,
        id_signal(),
        build_signals(rows, counters),
        counters,
        PublisherConfig {
            flush_period: Duration::from_secs(args.flush_interval),
            retry_window: Duration::from_secs(args.retry_window),
            retry_check: Duration::from_secs(RETRY_CHECK_SECS),
            low_water,
        },
    );

    info!("Starting flush loop");
    publisher.run();

    // The flush loop only returns on a stop request; wake the sampler in
    // case it is waiting for buffers and wait for it to finish.
    pool.request_stop();
    if sampler_thread.join().is_err() {
        error!("sampler thread panicked");
    }

    info!("cpumond stopped");
}
