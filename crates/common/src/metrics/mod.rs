//! Metrics and observability utilities
//!
//! Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all SkuMap metrics
pub const METRICS_PREFIX: &str = "skumap";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for bulk imports (whole files, much slower)
pub const IMPORT_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    15.00,  // 15s
    30.00,  // 30s
    60.00,  // 1m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Detection metrics
    describe_counter!(
        format!("{}_detection_batches_total", METRICS_PREFIX),
        Unit::Count,
        "Total detection batches scored"
    );

    describe_counter!(
        format!("{}_detection_skus_total", METRICS_PREFIX),
        Unit::Count,
        "SKUs scored, labelled by match type"
    );

    describe_histogram!(
        format!("{}_detection_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Detection batch latency in seconds"
    );

    // Import metrics
    describe_counter!(
        format!("{}_import_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Import rows processed"
    );

    describe_counter!(
        format!("{}_import_mappings_total", METRICS_PREFIX),
        Unit::Count,
        "Mappings written by imports, labelled created/updated"
    );

    describe_counter!(
        format!("{}_import_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Import mapping groups that failed"
    );

    describe_histogram!(
        format!("{}_import_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Import latency in seconds"
    );

    // Catalog mutations
    describe_counter!(
        format!("{}_mapping_mutations_total", METRICS_PREFIX),
        Unit::Count,
        "Mapping create/update/delete operations"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a scored detection batch
pub fn record_detection(duration_secs: f64, exact: usize, fuzzy: usize, undetected: usize) {
    counter!(format!("{}_detection_batches_total", METRICS_PREFIX)).increment(1);

    for (kind, count) in [("exact", exact), ("fuzzy", fuzzy), ("none", undetected)] {
        if count > 0 {
            counter!(
                format!("{}_detection_skus_total", METRICS_PREFIX),
                "match" => kind
            )
            .increment(count as u64);
        }
    }

    histogram!(format!("{}_detection_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record a finished import
pub fn record_import(duration_secs: f64, rows: usize, created: usize, updated: usize, errors: usize) {
    counter!(format!("{}_import_rows_total", METRICS_PREFIX)).increment(rows as u64);

    counter!(
        format!("{}_import_mappings_total", METRICS_PREFIX),
        "outcome" => "created"
    )
    .increment(created as u64);

    counter!(
        format!("{}_import_mappings_total", METRICS_PREFIX),
        "outcome" => "updated"
    )
    .increment(updated as u64);

    if errors > 0 {
        counter!(format!("{}_import_errors_total", METRICS_PREFIX)).increment(errors as u64);
    }

    histogram!(format!("{}_import_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record a mapping mutation (create, update, delete, delete_variation)
pub fn record_mutation(operation: &'static str) {
    counter!(
        format!("{}_mapping_mutations_total", METRICS_PREFIX),
        "operation" => operation
    )
    .increment(1);
}
