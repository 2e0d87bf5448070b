//! Stub CRUD handlers.

use crate::admin_api::types::*;
use crate::app::MqVirtualizer;
use crate::stub::StubRecord;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

/// Parse a stub definition from the request body
async fn parse_stub(req: Request<Incoming>) -> Result<StubRecord, Response<Full<Bytes>>> {
    let body = collect_body(req)
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &e))?;
    serde_json::from_slice(&body).map_err(|e| {
        coded_error_response(
            StatusCode::BAD_REQUEST,
            "bad_data",
            &format!("Invalid JSON: {e}"),
        )
    })
}

/// GET /stubs - List stubs, optionally filtered by `userId` or `status=active`
pub fn handle_list(app: Arc<MqVirtualizer>, query: Option<&str>) -> Response<Full<Bytes>> {
    let params = StubQueryParams::parse(query);
    let mut stubs = match params.user_id {
        Some(ref user_id) => app.stubs().list_by_user(user_id),
        None => app.stubs().list(),
    };
    if params.active_only {
        stubs.retain(|s| s.is_active());
    }
    json_response(StatusCode::OK, &ListStubsResponse { stubs })
}

/// POST /stubs - Create a stub
pub async fn handle_create(req: Request<Incoming>, app: Arc<MqVirtualizer>) -> Response<Full<Bytes>> {
    let stub = match parse_stub(req).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match app.stubs().create(stub).await {
        Ok(created) => json_response(StatusCode::CREATED, &created),
        Err(e) => stub_error_response(&e),
    }
}

/// GET /stubs/:id
pub fn handle_get(id: &str, app: Arc<MqVirtualizer>) -> Response<Full<Bytes>> {
    match app.stubs().get(id) {
        Ok(stub) => json_response(StatusCode::OK, &stub),
        Err(e) => stub_error_response(&e),
    }
}

/// PUT /stubs/:id - Replace a stub's definition
pub async fn handle_update(
    id: &str,
    req: Request<Incoming>,
    app: Arc<MqVirtualizer>,
) -> Response<Full<Bytes>> {
    let details = match parse_stub(req).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match app.stubs().update(id, details).await {
        Ok(updated) => json_response(StatusCode::OK, &updated),
        Err(e) => stub_error_response(&e),
    }
}

/// DELETE /stubs/:id
pub async fn handle_delete(id: &str, app: Arc<MqVirtualizer>) -> Response<Full<Bytes>> {
    match app.stubs().delete(id).await {
        Ok(_) => build_response(StatusCode::NO_CONTENT, Bytes::new()),
        Err(e) => stub_error_response(&e),
    }
}

/// POST /stubs/:id/toggle - Flip ACTIVE/INACTIVE
pub async fn handle_toggle(id: &str, app: Arc<MqVirtualizer>) -> Response<Full<Bytes>> {
    match app.stubs().toggle_status(id).await {
        Ok(stub) => json_response(StatusCode::OK, &stub),
        Err(e) => stub_error_response(&e),
    }
}
