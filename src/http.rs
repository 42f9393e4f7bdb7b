//! HTTP transport - maps every HTTP request onto [`Server::handle`].
//!
//! Requires the `http` feature. Uses axum with a single fallback handler, so
//! routing stays entirely inside the pipeline.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sups_rust::{http, Server, Settings};
//!
//! let server = Arc::new(Server::new(Settings::default())?);
//!
//! // Get the router to compose with other axum routes
//! let app = http::router(server.clone());
//!
//! // Or serve directly
//! http::serve(server, "0.0.0.0:3030").await?;
//! ```

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::Router;
use tracing::info;

use crate::server::{Request, Response, Server};

/// Build an axum `Router` that sends every request through the server.
pub fn router(server: Arc<Server>) -> Router {
    Router::new().fallback(handle).with_state(server)
}

/// Serve over HTTP at the given address (e.g. `"0.0.0.0:3030"`).
pub async fn serve(server: Arc<Server>, addr: &str) -> Result<(), std::io::Error> {
    let app = router(server);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await
}

async fn handle(
    State(server): State<Arc<Server>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let mut request = Request::new(method.as_str(), target).body_bytes(&body);
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            request = request.header(name.as_str(), value);
        }
    }

    let response = server.handle(request);
    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }
    into_http(response)
}

fn into_http(response: Response) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }
    let body = response.body.map(Body::from).unwrap_or_else(Body::empty);
    (status, headers, body).into_response()
}
