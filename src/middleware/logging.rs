use std::sync::{Arc, OnceLock};

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Largest body the failure log will buffer and echo. Matches the JSON
/// extractor's default request cap, so anything larger was never going to
/// reach a handler anyway.
const BODY_BUFFER_LIMIT: usize = 2 * 1024 * 1024;

/// Portion of the buffered body actually written to the log.
const LOGGED_BODY_LIMIT: usize = 4 * 1024;

/// Per-request slot the identity extractor fills once a bearer credential
/// resolves, so failure logs can name the acting user. First write wins.
#[derive(Clone, Default)]
pub struct RequestIdentity(Arc<OnceLock<Uuid>>);

impl RequestIdentity {
    pub fn record(&self, id: Uuid) {
        let _ = self.0.set(id);
    }

    fn get(&self) -> Option<Uuid> {
        self.0.get().copied()
    }
}

/// Log every failed request with its method, path, query, body, acting
/// identity (when resolved), and status. Runs around the handler; never
/// alters the response.
pub async fn log_failures(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let identity = RequestIdentity::default();
    request.extensions_mut().insert(identity.clone());

    let (request, body) = buffer_body(request).await;
    let response = next.run(request).await;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let path = uri.path();
        let query = uri.query().unwrap_or("");
        let body = body_preview(&body);
        let user_id = identity.get();
        if status.is_server_error() {
            tracing::error!(%method, path, query, body = %body, user_id = ?user_id, %status, "request failed");
        } else {
            tracing::warn!(%method, path, query, body = %body, user_id = ?user_id, %status, "request rejected");
        }
    }

    response
}

/// Read the body into memory and hand the handler an equivalent request.
/// A body over the buffer limit is dropped; the JSON extractor rejects the
/// now-empty request, the same outcome its own cap would produce.
async fn buffer_body(request: Request) -> (Request, Bytes) {
    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, BODY_BUFFER_LIMIT).await {
        Ok(bytes) => {
            let request = Request::from_parts(parts, Body::from(bytes.clone()));
            (request, bytes)
        }
        Err(_) => (Request::from_parts(parts, Body::empty()), Bytes::new()),
    }
}

fn body_preview(bytes: &Bytes) -> String {
    String::from_utf8_lossy(&bytes[..bytes.len().min(LOGGED_BODY_LIMIT)]).into_owned()
}
