//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{listeners, stubs, system};
use crate::admin_api::types::{get_base_url, not_found};
use crate::app::MqVirtualizer;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::sync::Arc;
use tracing::debug;

/// Parsed route for stub-specific endpoints
#[derive(Debug, PartialEq, Eq)]
enum StubRoute<'a> {
    /// GET/PUT/DELETE /stubs/:id
    ById(&'a str),
    /// POST /stubs/:id/toggle
    Toggle(&'a str),
}

impl<'a> StubRoute<'a> {
    /// Parse route from path segments after `/stubs/`
    fn parse(segments: &[&'a str]) -> Option<Self> {
        match segments {
            [id] if !id.is_empty() => Some(StubRoute::ById(id)),
            [id, "toggle"] if !id.is_empty() => Some(StubRoute::Toggle(id)),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    app: Arc<MqVirtualizer>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|s| s.to_string());
    let base_url = get_base_url(&req);

    debug!("Admin API: {} {}", method, path);

    let response = route_by_path(&method, &path, query.as_deref(), req, &base_url, app).await;
    Ok(response)
}

/// Route based on path
async fn route_by_path(
    method: &Method,
    path: &str,
    query: Option<&str>,
    req: Request<Incoming>,
    base_url: &str,
    app: Arc<MqVirtualizer>,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/") => return system::handle_root(base_url),
        (&Method::GET, "/health") => return system::handle_health(app).await,
        (&Method::GET, "/metrics") => return system::handle_metrics(),
        (&Method::GET, "/listeners") => return listeners::handle_list(app).await,
        (&Method::POST, "/publish") => return listeners::handle_publish(req, app).await,
        (&Method::GET, "/stubs") => return stubs::handle_list(app, query),
        (&Method::POST, "/stubs") => return stubs::handle_create(req, app).await,
        _ => {}
    }

    let Some(rest) = path.strip_prefix("/stubs/") else {
        return not_found();
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let Some(route) = StubRoute::parse(&segments) else {
        return not_found();
    };

    match (method, route) {
        (&Method::GET, StubRoute::ById(id)) => stubs::handle_get(id, app),
        (&Method::PUT, StubRoute::ById(id)) => stubs::handle_update(id, req, app).await,
        (&Method::DELETE, StubRoute::ById(id)) => stubs::handle_delete(id, app).await,
        (&Method::POST, StubRoute::Toggle(id)) => stubs::handle_toggle(id, app).await,
        _ => not_found(),
    }
}
