//! HTTP binding.
//!
//! Maps the WOPI endpoints onto [`WopiRequest`]s and runs them through the
//! host on tokio's blocking pool, since the stores do synchronous I/O.

use crate::request::{Target, WopiRequest};
use crate::response::WopiResponse;
use crate::server::WopiServer;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Debug, Default, Deserialize)]
struct AccessQuery {
    access_token: Option<String>,
}

/// Builds the router for `server`.
pub fn router(server: Arc<WopiServer>) -> Router {
    let body_limit = server.config().max_body_bytes;
    Router::new()
        .route("/wopi/files/{file_id}", get(file).post(file))
        .route("/wopi/files/{file_id}/contents", get(contents).post(contents))
        .route("/share/{uuid}", get(share))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn file(
    State(server): State<Arc<WopiServer>>,
    method: Method,
    uri: Uri,
    Path(file_id): Path<String>,
    Query(query): Query<AccessQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = build(&server, method, Target::File, file_id, &uri, query, headers, body);
    run(server, request).await
}

async fn contents(
    State(server): State<Arc<WopiServer>>,
    method: Method,
    uri: Uri,
    Path(file_id): Path<String>,
    Query(query): Query<AccessQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = build(&server, method, Target::Contents, file_id, &uri, query, headers, body);
    run(server, request).await
}

async fn share(State(server): State<Arc<WopiServer>>, Path(uuid): Path<String>) -> Response {
    match tokio::task::spawn_blocking(move || server.download_share(&uuid)).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            error!(error = %err, "share download task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build(
    server: &WopiServer,
    method: Method,
    target: Target,
    file_id: String,
    uri: &Uri,
    query: AccessQuery,
    headers: HeaderMap,
    body: Bytes,
) -> WopiRequest {
    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    let mut request = WopiRequest::new(method, target, file_id)
        .url(format!("{}{path}", server.config().public_url))
        .body(body);
    request.access_token = query.access_token;
    request.headers = headers;
    request
}

async fn run(server: Arc<WopiServer>, request: WopiRequest) -> Response {
    match tokio::task::spawn_blocking(move || server.handle(&request)).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            error!(error = %err, "request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

impl IntoResponse for WopiResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
