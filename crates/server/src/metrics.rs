//! Prometheus metrics for the Perch server.
//!
//! Covers uploads, update checks, downloads and rollbacks. The `/metrics`
//! endpoint is unauthenticated; restrict it at the network level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upload metrics
pub static UPLOADS_COMMITTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "perch_uploads_committed_total",
            "Total number of releases published by upload",
        ),
        &["platform"],
    )
    .expect("metric creation failed")
});

pub static UPLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("perch_upload_errors_total", "Total number of failed uploads"),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "perch_bytes_uploaded_total",
        "Total artifact bytes committed by uploads",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "perch_upload_duration_seconds",
            "Time from the start of an upload request to its commit",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )
    .expect("metric creation failed")
});

// Update check metrics
pub static UPDATE_CHECKS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "perch_update_checks_total",
            "Total number of update checks by platform and result",
        ),
        &["platform", "result"],
    )
    .expect("metric creation failed")
});

// Download metrics
pub static DOWNLOADS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "perch_downloads_total",
            "Total number of artifact downloads by platform and status",
        ),
        &["platform", "status"],
    )
    .expect("metric creation failed")
});

pub static BYTES_DOWNLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "perch_bytes_downloaded_total",
        "Total artifact bytes served (by Content-Length)",
    )
    .expect("metric creation failed")
});

// Rollback metrics
pub static ROLLBACKS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("perch_rollbacks_total", "Total number of rollbacks by result"),
        &["result"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent; later calls are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS_COMMITTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPDATE_CHECKS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOWNLOADS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_DOWNLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ROLLBACKS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Helper to record upload errors by reason.
pub fn record_upload_error(reason: &str) {
    UPLOAD_ERRORS.with_label_values(&[reason]).inc();
}

/// Helper to record an update check outcome.
pub fn record_update_check(platform: &str, result: &str) {
    UPDATE_CHECKS.with_label_values(&[platform, result]).inc();
}

/// Helper to record a download attempt.
pub fn record_download(platform: &str, status: &str) {
    DOWNLOADS.with_label_values(&[platform, status]).inc();
}
