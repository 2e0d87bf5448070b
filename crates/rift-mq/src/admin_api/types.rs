//! Request/response types and helpers for the Admin API.

use crate::broker::InboundMessage;
use crate::stub::{Destination, StubError, StubRecord};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Link structure used in the root document
#[derive(Debug, Serialize, Clone)]
pub struct Link {
    pub href: String,
}

/// Response for listing stubs
#[derive(Debug, Serialize)]
pub struct ListStubsResponse {
    pub stubs: Vec<StubRecord>,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Request to put a message on a destination
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub destination: Destination,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub reply_to: Option<Destination>,
}

impl PublishRequest {
    /// Target destination and the message to put on it. A `ContentType`
    /// property is guessed from the payload unless one was supplied.
    pub fn into_message(self) -> (Destination, InboundMessage) {
        let content_type = detect_content_type(&self.payload);
        let mut message = InboundMessage::new(String::new(), self.payload);
        message.properties = self.headers;
        message
            .properties
            .entry("ContentType".to_string())
            .or_insert_with(|| content_type.to_string());
        message.correlation_id = self.correlation_id;
        message.reply_to = self.reply_to;
        (self.destination, message)
    }
}

/// Content type guessed from the first non-blank character
pub fn detect_content_type(payload: &str) -> &'static str {
    let trimmed = payload.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        "application/json"
    } else if trimmed.starts_with('<') {
        "application/xml"
    } else {
        "text/plain"
    }
}

/// Query parameters for the stub list endpoint
#[derive(Debug, Default)]
pub struct StubQueryParams {
    pub user_id: Option<String>,
    pub active_only: bool,
}

impl StubQueryParams {
    /// Parse query parameters from query string
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        for pair in query.unwrap_or_default().split('&') {
            match pair.split_once('=') {
                Some(("userId", value)) if !value.is_empty() => {
                    params.user_id = Some(value.to_string())
                }
                Some(("status", value)) => params.active_only = value.eq_ignore_ascii_case("active"),
                _ => {}
            }
        }
        params
    }
}

/// Extract base URL from request headers for links
pub fn get_base_url(req: &Request<Incoming>) -> String {
    if let Some(host) = req.headers().get("host") {
        if let Ok(host_str) = host.to_str() {
            return format!("http://{}", host_str);
        }
    }
    "http://localhost:8090".to_string()
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with the given status and body.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Build an HTTP response with headers.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Create an error response with an explicit error code
pub fn coded_error_response(
    status: StatusCode,
    code: &str,
    message: &str,
) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

/// Create an error response coded with the status number
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    coded_error_response(status, status.as_str(), message)
}

/// Map a stub error to its HTTP representation
pub fn stub_error_response(error: &StubError) -> Response<Full<Bytes>> {
    let (status, code) = match error {
        StubError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        StubError::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
        StubError::PriorityConflict { .. } => (StatusCode::CONFLICT, "priority_conflict"),
        StubError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_stub"),
    };
    coded_error_response(status, code, &error.to_string())
}

/// Create a not found response
pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    use http_body_util::BodyExt;
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_query_params_parse() {
        let params = StubQueryParams::parse(Some("userId=alice&status=ACTIVE"));
        assert_eq!(params.user_id.as_deref(), Some("alice"));
        assert!(params.active_only);

        let params = StubQueryParams::parse(None);
        assert!(params.user_id.is_none());
        assert!(!params.active_only);
    }

    #[test]
    fn test_detect_content_type() {
        assert_eq!(detect_content_type(r#" {"a": 1}"#), "application/json");
        assert_eq!(detect_content_type("[1]"), "application/json");
        assert_eq!(detect_content_type("<order/>"), "application/xml");
        assert_eq!(detect_content_type("hello"), "text/plain");
    }

    #[test]
    fn test_publish_request_keeps_explicit_content_type() {
        let request: PublishRequest = serde_json::from_str(
            r#"{"destination": {"type": "QUEUE", "name": "ORDERS"}, "payload": "{}", "headers": {"ContentType": "custom"}}"#,
        )
        .unwrap();
        let (destination, message) = request.into_message();
        assert_eq!(destination.name, "ORDERS");
        assert_eq!(message.property("ContentType"), Some("custom"));
    }

    #[test]
    fn test_stub_error_codes() {
        let resp = stub_error_response(&StubError::PriorityConflict {
            priority: 1,
            existing_priority: 2,
            existing: "x".to_string(),
        });
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = stub_error_response(&StubError::NotFound("x".to_string()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = stub_error_response(&StubError::Validation("x".to_string()));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_json_response() {
        let body = serde_json::json!({"test": "value"});
        let resp = json_response(StatusCode::OK, &body);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_not_found_response() {
        let resp = not_found();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
