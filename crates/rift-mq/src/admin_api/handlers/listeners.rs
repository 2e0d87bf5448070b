//! Listener inspection and message publishing.

use crate::admin_api::types::*;
use crate::app::MqVirtualizer;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::info;

/// GET /listeners - Live subscriptions, one per registered stub
pub async fn handle_list(app: Arc<MqVirtualizer>) -> Response<Full<Bytes>> {
    let listeners = app.listeners().subscriptions().await;
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "listeners": listeners }),
    )
}

/// POST /publish - Put a message on a destination as an external producer
pub async fn handle_publish(req: Request<Incoming>, app: Arc<MqVirtualizer>) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let request: PublishRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}")),
    };
    if request.destination.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "destination name must not be empty");
    }

    let (destination, message) = request.into_message();
    let message_id = app.broker().publish(&destination, message);
    info!(destination = %destination, message_id = %message_id, "Published message");

    json_response(
        StatusCode::ACCEPTED,
        &serde_json::json!({
            "messageId": message_id,
            "destination": destination,
        }),
    )
}
