//! Prometheus metrics for the pool-sync subsystems.
//!
//! All metrics follow the naming convention: `ps_<subsystem>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., events_fetched_total)
//! - **Gauge**: Value that can go up or down (e.g., last_synced_block)
//! - **Histogram**: Distribution of values (e.g., tree_build_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, GaugeVec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT SYNC METRICS (Subsystem 1)
    // =========================================================================

    /// Events returned by each source
    pub static ref EVENTS_FETCHED: IntCounterVec = IntCounterVec::new(
        Opts::new("ps_sync_events_fetched_total", "Events fetched by source"),
        &["kind", "source"]  // source: cache/indexer/rpc
    ).expect("metric creation failed");

    /// Source failures that were absorbed by falling back
    pub static ref SOURCE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("ps_sync_source_failures_total", "Event source failures"),
        &["source"]
    ).expect("metric creation failed");

    /// Retried log range requests
    pub static ref RPC_RETRIES: IntCounter = IntCounter::new(
        "ps_sync_rpc_retries_total",
        "Log range requests retried after a provider error"
    ).expect("metric creation failed");

    /// Deposit sequences truncated at a missing leaf index
    pub static ref LEAF_GAPS: IntCounter = IntCounter::new(
        "ps_sync_leaf_gaps_total",
        "Deposit sequences truncated at a missing leaf index"
    ).expect("metric creation failed");

    /// Highest block covered per collection
    pub static ref LAST_SYNCED_BLOCK: GaugeVec = GaugeVec::new(
        Opts::new("ps_sync_last_synced_block", "Highest covered block per collection"),
        &["collection"]
    ).expect("metric creation failed");

    /// Duration of one batched log fetch
    pub static ref BATCH_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "ps_sync_batch_duration_seconds",
            "Time spent fetching one batch of log ranges"
        ).buckets(buckets(0.01, 2.0, 14)),
        &["network"]
    ).expect("metric creation failed");

    /// Events written to the persisted store
    pub static ref EVENTS_SAVED: IntCounterVec = IntCounterVec::new(
        Opts::new("ps_store_events_saved_total", "Events upserted into the persisted store"),
        &["kind"]
    ).expect("metric creation failed");

    /// Duplicate events rejected during snapshot verification
    pub static ref SNAPSHOT_DUPLICATES: IntCounter = IntCounter::new(
        "ps_snapshot_duplicates_total",
        "Snapshot files rejected for duplicate events"
    ).expect("metric creation failed");

    // =========================================================================
    // MERKLE TREE METRICS (Subsystem 2)
    // =========================================================================

    /// Leaves in the most recently built tree
    pub static ref TREE_LEAVES: GaugeVec = GaugeVec::new(
        Opts::new("ps_tree_leaves", "Leaves in the current tree"),
        &["instance"]
    ).expect("metric creation failed");

    /// Tree build duration
    pub static ref TREE_BUILD_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "ps_tree_build_duration_seconds",
            "Time spent building a tree from deposits"
        ).buckets(buckets(0.001, 2.0, 16))
    ).expect("metric creation failed");

    /// Deposits the contract has accepted beyond the synced history
    pub static ref DEPOSIT_SHORTFALL: GaugeVec = GaugeVec::new(
        Opts::new(
            "ps_tree_deposit_shortfall",
            "Contract nextIndex minus synced deposits, per instance"
        ),
        &["instance"]
    ).expect("metric creation failed");

    /// Built roots the contract did not recognise
    pub static ref ROOT_MISMATCHES: IntCounter = IntCounter::new(
        "ps_tree_root_mismatches_total",
        "Built tree roots rejected by the pool contract"
    ).expect("metric creation failed");
}

fn buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    exponential_buckets(start, factor, count).unwrap_or_else(|_| vec![start])
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Event sync
        Box::new(EVENTS_FETCHED.clone()),
        Box::new(SOURCE_FAILURES.clone()),
        Box::new(RPC_RETRIES.clone()),
        Box::new(LEAF_GAPS.clone()),
        Box::new(LAST_SYNCED_BLOCK.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(EVENTS_SAVED.clone()),
        Box::new(SNAPSHOT_DUPLICATES.clone()),
        // Merkle tree
        Box::new(TREE_LEAVES.clone()),
        Box::new(TREE_BUILD_DURATION.clone()),
        Box::new(DEPOSIT_SHORTFALL.clone()),
        Box::new(ROOT_MISMATCHES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::HistogramTimer::new(&$histogram)
    };
}
