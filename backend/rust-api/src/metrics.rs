use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Store Metrics (Supabase REST)
    pub static ref STORE_QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_queries_total",
        "Total number of relational store queries",
        &["table", "status"]
    )
    .unwrap();

    pub static ref STORE_QUERY_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_query_duration_seconds",
        "Relational store query duration in seconds",
        &["table"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap();

    // Business Metrics
    pub static ref MODULE_STATUS_EVALUATIONS_TOTAL: IntCounter = register_int_counter!(
        "module_status_evaluations_total",
        "Number of modules evaluated by the completion aggregator"
    )
    .unwrap();

    pub static ref LEARNING_PATHS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "learning_paths_generated_total",
        "Learning path generation requests by outcome",
        &["outcome"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a store query with metrics
pub async fn track_store_query<F, T, E>(table: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_QUERIES_TOTAL
        .with_label_values(&[table, status])
        .inc();

    STORE_QUERY_DURATION_SECONDS
        .with_label_values(&[table])
        .observe(duration);

    result
}
