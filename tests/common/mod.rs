//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ids_gate::config::IdsConfig;
use ids_gate::inspection::{InspectionPolicy, RequestInspector};
use ids_gate::lifecycle::Shutdown;
use ids_gate::observability::{MemorySink, SecurityLog};
use ids_gate::HttpServer;

pub const INJECTION_URI: &str = "/user?username=admin'%20OR%20'1'='1";

/// Defaults with the file sink turned off and housekeeping disabled.
pub fn test_config() -> IdsConfig {
    let mut config = IdsConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.logging.file_path = None;
    config.inspection.housekeeping_secs = 0;
    config
}

/// An inspector whose security log is captured in memory.
pub fn inspector(config: &IdsConfig) -> (Arc<RequestInspector>, MemorySink) {
    let sink = MemorySink::new();
    let log = SecurityLog::console_only().with_sink(sink.clone());
    let inspector = Arc::new(RequestInspector::new(
        InspectionPolicy::from(&config.inspection),
        log,
    ));
    (inspector, sink)
}

pub fn gate(config: IdsConfig) -> (HttpServer, MemorySink) {
    let (inspector, sink) = inspector(&config);
    (HttpServer::with_inspector(config, inspector), sink)
}

/// A GET request as if it arrived from `ip` over a real connection.
pub fn request_from(uri: &str, ip: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{}:40000", ip).parse().unwrap();
    let mut request = Request::builder()
        .uri(uri)
        .header("user-agent", "integration-test")
        .body(Body::empty())
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A gate listening on an ephemeral port.
pub struct RunningGate {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub sink: MemorySink,
    pub inspector: Arc<RequestInspector>,
    pub updates: mpsc::UnboundedSender<IdsConfig>,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

pub async fn start_gate(config: IdsConfig) -> RunningGate {
    let (server, sink) = gate(config);
    let inspector = server.inspector();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    tokio::time::sleep(Duration::from_millis(50)).await;

    RunningGate {
        addr,
        shutdown,
        sink,
        inspector,
        updates,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
