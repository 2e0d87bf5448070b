//! System handlers: root, health, metrics.

use crate::admin_api::types::*;
use crate::app::MqVirtualizer;
use crate::broker::BrokerAdapter;
use crate::metrics;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

/// GET / - Root endpoint
pub fn handle_root(base_url: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "_links": {
            "stubs": Link { href: format!("{}/stubs", base_url) },
            "listeners": Link { href: format!("{}/listeners", base_url) },
            "publish": Link { href: format!("{}/publish", base_url) },
            "metrics": Link { href: format!("{}/metrics", base_url) }
        }
    });
    json_response(StatusCode::OK, &body)
}

/// GET /health - Health check
pub async fn handle_health(app: Arc<MqVirtualizer>) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "status": "ok",
        "broker": app.broker().name(),
        "stubs": app.stubs().list().len(),
        "listeners": app.listeners().subscription_count().await,
    });
    json_response(StatusCode::OK, &body)
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics::collect_metrics(),
    )
}
