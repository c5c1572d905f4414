//! Prometheus metrics for the dashboard server.
//!
//! Exposes:
//! - `conversion_dashboard_request_duration_seconds` (histogram)
//! - `conversion_dashboard_requests_total` (counter with status)
//! - `conversion_dashboard_requests_inflight` (gauge)
//! - `conversion_dashboard_model_loads_total` (counter with status)
//! - process metrics via `process` collector

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tracing::{error, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 1ms up to ~8 seconds.
    let buckets =
        prometheus::exponential_buckets(0.001, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "conversion_dashboard_request_duration_seconds",
        "HTTP request duration in seconds",
        &["route"],
        buckets
    )
    .expect("failed to register request duration histogram")
});

static REQUEST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "conversion_dashboard_requests_total",
        "Total HTTP requests by route and status code",
        &["route", "status"]
    )
    .expect("failed to register request counter")
});

static REQUEST_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "conversion_dashboard_requests_inflight",
        "Number of in-flight HTTP requests",
        &["route"]
    )
    .expect("failed to register inflight gauge")
});

static MODEL_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "conversion_dashboard_model_loads_total",
        "Classifier loads from disk by status",
        &["status"]
    )
    .expect("failed to register model load counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&REQUEST_DURATION);
    Lazy::force(&REQUEST_TOTAL);
    Lazy::force(&REQUEST_INFLIGHT);
    Lazy::force(&MODEL_LOADS);
}

/// Keeps a route's in-flight gauge raised until dropped, including when the
/// request future is cancelled by a client disconnect.
#[must_use]
pub struct InflightGuard {
    route: &'static str,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        REQUEST_INFLIGHT.with_label_values(&[self.route]).dec();
    }
}

/// Increment inflight gauge for a route.
pub fn record_request_start(route: &'static str) -> InflightGuard {
    init_collectors();
    REQUEST_INFLIGHT.with_label_values(&[route]).inc();
    InflightGuard { route }
}

/// Record request completion with duration and response status.
pub fn record_request_result(route: &'static str, duration: Duration, status: StatusCode) {
    init_collectors();
    REQUEST_DURATION
        .with_label_values(&[route])
        .observe(duration.as_secs_f64());
    REQUEST_TOTAL
        .with_label_values(&[route, status.as_str()])
        .inc();
}

/// Count a classifier load attempt.
pub fn record_model_load(success: bool) {
    init_collectors();
    MODEL_LOADS
        .with_label_values(&[if success { "ok" } else { "error" }])
        .inc();
}

/// Prometheus text exposition of the default registry.
pub fn metrics_response() -> Response<Full<Bytes>> {
    init_collectors();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        let mut response = Response::new(Full::from("encode error"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return response;
    }

    let mut response = Response::new(Full::from(buffer));
    if let Ok(value) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}
