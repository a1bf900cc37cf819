//! End-to-end behaviour of the inspection pipeline behind the HTTP stack.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Router};
use tower::ServiceExt;

use ids_gate::detection::Detector;
use ids_gate::http::middleware::inspection_middleware;
use ids_gate::inspection::response::{BLOCKED_DETAIL, ESCALATED_DETAIL, INTERNAL_ERROR_DETAIL};
use ids_gate::inspection::{RequestDescriptor, RequestInspector};
use ids_gate::observability::EventKind;

mod common;

use common::{gate, inspector, json_body, request_from, test_config, INJECTION_URI};

#[tokio::test]
async fn test_benign_request_is_forwarded_and_logged() {
    let (server, sink) = gate(test_config());

    let response = server
        .router()
        .oneshot(request_from("/products?category=books&page=2", "10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["endpoint"], "/products");
    assert_eq!(body["params"]["category"], "books");

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event, EventKind::Request);
    assert_eq!(records[0].fields.source, "10.0.0.1");
    assert_eq!(records[0].fields.status, Some(200));
    assert_eq!(records[0].fields.suspicious, Some(false));
    assert_eq!(records[0].fields.user_agent, "integration-test");
    assert!(records[0].fields.request_id.is_some());
}

#[tokio::test]
async fn test_repeated_injection_escalates_then_blocks() {
    let (server, sink) = gate(test_config());
    let router = server.router();

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(request_from(INJECTION_URI, "10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(request_from(INJECTION_URI, "10.0.0.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    let body = json_body(response).await;
    assert_eq!(body["detail"], ESCALATED_DETAIL);
    assert!(body.get("retry_in_seconds").is_none());

    // Even a clean request is refused while the block lasts.
    let response = router
        .clone()
        .oneshot(request_from("/products", "10.0.0.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 30);
    let body = json_body(response).await;
    assert_eq!(body["detail"], BLOCKED_DETAIL);
    assert_eq!(body["retry_in_seconds"].as_u64(), Some(retry_after));

    assert_eq!(sink.events(EventKind::Suspicious).len(), 3);
    assert_eq!(sink.events(EventKind::IdsBlock).len(), 1);
    assert_eq!(sink.events(EventKind::Blocked).len(), 1);

    let ids_block = &sink.events(EventKind::IdsBlock)[0];
    assert_eq!(ids_block.fields.count, Some(3));
    assert_eq!(ids_block.fields.reason.as_deref(), Some("threshold_exceeded"));

    // Other sources are unaffected.
    let response = router
        .oneshot(request_from("/products", "10.0.0.3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_inspection_only_logs() {
    let mut config = test_config();
    config.inspection.enabled = false;
    let (server, sink) = gate(config);
    let router = server.router();

    for _ in 0..5 {
        let response = router
            .clone()
            .oneshot(request_from(INJECTION_URI, "10.0.0.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(sink.events(EventKind::Suspicious).len(), 5);
    assert!(sink.events(EventKind::IdsBlock).is_empty());
    assert!(server.inspector().blocks().is_empty());
}

#[tokio::test]
async fn test_policy_update_applies_to_next_request() {
    let (server, sink) = gate(test_config());
    let router = server.router();
    let inspector = server.inspector();

    let mut config = test_config();
    config.inspection.threshold = 1;
    inspector.update_policy((&config.inspection).into());

    let response = router
        .oneshot(request_from(INJECTION_URI, "10.0.0.5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(sink.events(EventKind::IdsBlock).len(), 1);
}

async fn panicking_handler() -> &'static str {
    panic!("handler exploded")
}

async fn failing_handler() -> Response {
    StatusCode::SERVICE_UNAVAILABLE.into_response()
}

fn guarded(inspector: Arc<RequestInspector>) -> Router {
    Router::new()
        .route("/panic", get(panicking_handler))
        .route("/unavailable", get(failing_handler))
        .route("/search", get(search_handler))
        .layer(middleware::from_fn_with_state(
            inspector.clone(),
            inspection_middleware,
        ))
        .with_state(inspector)
}

#[tokio::test]
async fn test_handler_panic_becomes_internal_error() {
    let (inspector, sink) = inspector(&test_config());

    let response = guarded(inspector)
        .oneshot(request_from("/panic", "10.0.0.6"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["detail"], INTERNAL_ERROR_DETAIL);

    let errors = sink.events(EventKind::UnhandledError);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].fields.status, Some(500));
    assert!(errors[0]
        .fields
        .error
        .as_deref()
        .unwrap()
        .contains("handler exploded"));
}

#[tokio::test]
async fn test_error_status_from_handler_passes_through() {
    let (inspector, sink) = inspector(&test_config());

    let response = guarded(inspector)
        .oneshot(request_from("/unavailable", "10.0.0.7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let requests = sink.events(EventKind::Request);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].fields.status, Some(503));
}

async fn search_handler(
    State(inspector): State<Arc<RequestInspector>>,
    Extension(request): Extension<Arc<RequestDescriptor>>,
) -> Response {
    if let Err(rejection) = inspector.validate_param(&request, "q", Detector::Generic) {
        return rejection.into_response();
    }
    StatusCode::OK.into_response()
}

#[tokio::test]
async fn test_validate_param_rejects_with_field_name() {
    let mut config = test_config();
    // Keep the source unblocked so the handler is reached.
    config.inspection.threshold = 100;
    let (inspector, sink) = inspector(&config);
    let router = guarded(inspector);

    let response = router
        .clone()
        .oneshot(request_from("/search?q=rust%20books", "10.0.0.8"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(request_from("/search?q=books;%20rm%20-rf", "10.0.0.8"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid q");

    let validations = sink.events(EventKind::Validation);
    assert_eq!(validations.len(), 1);
    assert_eq!(validations[0].fields.field.as_deref(), Some("q"));
}

#[tokio::test]
async fn test_served_over_tcp_until_shutdown() {
    let gate = common::start_gate(test_config()).await;
    let client = common::client();
    let base = format!("http://{}", gate.addr);

    let response = client
        .get(format!("{}/products?page=1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    for _ in 0..3 {
        client
            .get(format!("{}{}", base, INJECTION_URI))
            .send()
            .await
            .unwrap();
    }

    let response = client
        .get(format!("{}/products", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);
    assert!(response.headers().contains_key("retry-after"));

    let blocks = gate.sink.events(EventKind::IdsBlock);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].fields.source, "127.0.0.1");

    gate.shutdown.trigger();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), gate.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_config_update_channel_swaps_policy() {
    let gate = common::start_gate(test_config()).await;
    let client = common::client();
    let base = format!("http://{}", gate.addr);

    // One flagged request under the default threshold of 3.
    let response = client
        .get(format!("{}{}", base, INJECTION_URI))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let mut config = test_config();
    config.inspection.threshold = 2;
    gate.updates.send(config).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while gate.inspector.policy().threshold != 2 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("policy update not applied");

    // Earlier activity is kept, so the second suspicious request crosses the new threshold.
    let response = client
        .get(format!("{}{}", base, INJECTION_URI))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);
    let blocks = gate.sink.events(EventKind::IdsBlock);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].fields.count, Some(2));

    gate.shutdown.trigger();
}

async fn slow_handler() -> &'static str {
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    "late"
}

#[tokio::test]
async fn test_slow_handler_times_out_with_408() {
    let mut config = test_config();
    config.timeouts.request_secs = 1;
    let (inspector, sink) = inspector(&config);
    let routes = Router::new().route("/slow", get(slow_handler));
    let server = ids_gate::HttpServer::with_routes(config, inspector, routes);

    let response = server
        .router()
        .oneshot(request_from("/slow", "10.0.0.9"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let requests = sink.events(EventKind::Request);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].fields.status, Some(408));
}
