use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_readings_total",
        "Total readings received over HTTP and MQTT"
    ))
    .unwrap();
    pub static ref VALID_READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_valid_readings_total",
        "Total readings accepted after validation"
    ))
    .unwrap();
    pub static ref INVALID_READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_invalid_readings_total",
        "Total readings rejected"
    ))
    .unwrap();
    pub static ref STORE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_store_failures_total",
        "Total failed writes to the reading store"
    ))
    .unwrap();
    pub static ref FLUSH_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dashboard_flush_latency_seconds",
            "Time taken to write a reading batch to the store"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
    pub static ref BATCH_SIZE: Gauge = Gauge::with_opts(Opts::new(
        "dashboard_batch_size",
        "Current reading batch size being processed"
    ))
    .unwrap();
    pub static ref REPORT_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("dashboard_report_requests_total", "Total report requests served"),
        &["report"]
    )
    .unwrap();
    pub static ref REPORT_LATENCY_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "dashboard_report_latency_seconds",
            "Time taken to build a report"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["report"]
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(READINGS_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(VALID_READINGS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(INVALID_READINGS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(STORE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(FLUSH_LATENCY_SECONDS.clone()))
        .unwrap();
    REGISTRY.register(Box::new(BATCH_SIZE.clone())).unwrap();
    REGISTRY
        .register(Box::new(REPORT_REQUESTS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(REPORT_LATENCY_SECONDS.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Counts a report request and times it until the returned timer drops.
pub fn observe_report(report: &str) -> prometheus::HistogramTimer {
    REPORT_REQUESTS_TOTAL.with_label_values(&[report]).inc();
    REPORT_LATENCY_SECONDS
        .with_label_values(&[report])
        .start_timer()
}
