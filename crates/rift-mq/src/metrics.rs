//! Prometheus metrics for rift-mq.
//!
//! Tracks message consumption, stub matching, reply dispatch and listener counts.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Messages delivered to any subscription
    pub static ref MESSAGES_RECEIVED_TOTAL: CounterVec = register_counter_vec!(
        "rift_mq_messages_received_total",
        "Total number of messages delivered to stub listeners",
        &["destination"]
    )
    .unwrap();

    /// Messages that selected a stub
    pub static ref MESSAGES_MATCHED_TOTAL: CounterVec = register_counter_vec!(
        "rift_mq_messages_matched_total",
        "Total number of messages matched to a stub",
        &["stub_id"]
    )
    .unwrap();

    /// Messages dropped because no stub matched
    pub static ref MESSAGES_UNMATCHED_TOTAL: CounterVec = register_counter_vec!(
        "rift_mq_messages_unmatched_total",
        "Total number of messages without a matching stub",
        &["destination"]
    )
    .unwrap();

    /// Failures caught at the dispatch boundary
    pub static ref DISPATCH_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "rift_mq_dispatch_errors_total",
        "Total number of errors caught while dispatching messages",
        &["stage"]  // stage: extract|match|handler
    )
    .unwrap();

    /// Reply outcomes
    pub static ref RESPONSES_TOTAL: CounterVec = register_counter_vec!(
        "rift_mq_responses_total",
        "Total number of stub replies by outcome",
        &["result"]  // result: sent|failed|skipped
    )
    .unwrap();

    /// Configured reply latency
    pub static ref RESPONSE_LATENCY_MS: HistogramVec = register_histogram_vec!(
        "rift_mq_response_latency_ms",
        "Histogram of artificial reply latency in milliseconds",
        &["stub_id"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    /// Webhook invocations
    pub static ref WEBHOOK_CALLS_TOTAL: CounterVec = register_counter_vec!(
        "rift_mq_webhook_calls_total",
        "Total number of webhook calls by outcome",
        &["result"]  // result: success|error
    )
    .unwrap();

    /// Live stub subscriptions
    pub static ref ACTIVE_SUBSCRIPTIONS: Gauge = register_gauge!(
        "rift_mq_active_subscriptions",
        "Number of running stub subscriptions"
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_received(destination: &str) {
    MESSAGES_RECEIVED_TOTAL
        .with_label_values(&[destination])
        .inc();
}

pub fn record_matched(stub_id: &str) {
    MESSAGES_MATCHED_TOTAL.with_label_values(&[stub_id]).inc();
}

pub fn record_unmatched(destination: &str) {
    MESSAGES_UNMATCHED_TOTAL
        .with_label_values(&[destination])
        .inc();
}

pub fn record_dispatch_error(stage: &str) {
    DISPATCH_ERRORS_TOTAL.with_label_values(&[stage]).inc();
}

pub fn record_response(result: &str) {
    RESPONSES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_response_latency(stub_id: &str, latency_ms: u64) {
    RESPONSE_LATENCY_MS
        .with_label_values(&[stub_id])
        .observe(latency_ms as f64);
}

/// Drop the per-stub series of a deleted stub.
///
/// Destination labels need no pruning: they are bounded by the destinations
/// that have a subscription.
pub fn forget_stub(stub_id: &str) {
    let _ = MESSAGES_MATCHED_TOTAL.remove_label_values(&[stub_id]);
    let _ = RESPONSE_LATENCY_MS.remove_label_values(&[stub_id]);
}

pub fn record_webhook_call(success: bool) {
    let result = if success { "success" } else { "error" };
    WEBHOOK_CALLS_TOTAL.with_label_values(&[result]).inc();
}

pub fn set_active_subscriptions(count: usize) {
    ACTIVE_SUBSCRIPTIONS.set(count as f64);
}
