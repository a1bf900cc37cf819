//! Inspection middleware.
//! Runs every inbound request through the shared `RequestInspector`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use crate::inspection::{DownstreamError, RequestDescriptor, RequestInspector};

pub async fn inspection_middleware(
    State(inspector): State<Arc<RequestInspector>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let descriptor = Arc::new(RequestDescriptor::from_request(&request));
    // Handlers can read the normalized view with `Extension<Arc<RequestDescriptor>>`.
    request.extensions_mut().insert(descriptor.clone());

    let inspection = inspector
        .inspect(&descriptor, move || {
            AssertUnwindSafe(next.run(request))
                .catch_unwind()
                .map(|result| result.map_err(DownstreamError::from_panic))
        })
        .await;

    inspection.verdict.into_response()
}
