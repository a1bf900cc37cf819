//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the inspection middleware in front of every route
//! - Wire up middleware (tracing, request ID, timeout)
//! - Apply reloaded inspection policies
//! - Run housekeeping and serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::StatusCode,
    middleware,
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::IdsConfig;
use crate::http::middleware::inspection_middleware;
use crate::inspection::{InspectionPolicy, RequestDescriptor, RequestInspector};
use crate::observability::SecurityLog;
use crate::tracking::housekeeping::Housekeeper;

/// HTTP server fronted by the request inspector.
pub struct HttpServer {
    router: Router,
    config: IdsConfig,
    inspector: Arc<RequestInspector>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: IdsConfig) -> Self {
        let log = SecurityLog::from_config(&config.logging);
        let inspector = Arc::new(RequestInspector::new(
            InspectionPolicy::from(&config.inspection),
            log,
        ));
        Self::with_inspector(config, inspector)
    }

    /// Create a server around an existing inspector, serving the echo routes.
    pub fn with_inspector(config: IdsConfig, inspector: Arc<RequestInspector>) -> Self {
        let routes = Router::new()
            .route("/", any(echo_handler))
            .route("/{*path}", any(echo_handler));
        Self::with_routes(config, inspector, routes)
    }

    /// Put `routes` behind the inspection stack.
    pub fn with_routes(
        config: IdsConfig,
        inspector: Arc<RequestInspector>,
        routes: Router,
    ) -> Self {
        let router = Self::build_router(&config, inspector.clone(), routes);
        Self {
            router,
            config,
            inspector,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers listed later wrap the earlier ones, so the trace layer is outermost
    /// and the timeout only bounds the downstream handler.
    fn build_router(config: &IdsConfig, inspector: Arc<RequestInspector>, routes: Router) -> Router {
        routes
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(middleware::from_fn_with_state(inspector, inspection_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving or for driving requests directly.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn inspector(&self) -> Arc<RequestInspector> {
        self.inspector.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &IdsConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<IdsConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let inspector = self.inspector.clone();
        let mut updates_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => inspector.update_policy(InspectionPolicy::from(&config.inspection)),
                        None => break,
                    },
                    _ = updates_shutdown.recv() => break,
                }
            }
        });

        if self.config.inspection.housekeeping_secs > 0 {
            let housekeeper = Housekeeper::new(
                self.inspector.clone(),
                Duration::from_secs(self.config.inspection.housekeeping_secs),
            );
            let housekeeping_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                housekeeper.run(housekeeping_shutdown).await;
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Stand-in for the business routes: echoes what the inspector saw.
async fn echo_handler(Extension(request): Extension<Arc<RequestDescriptor>>) -> Json<Value> {
    Json(json!({
        "endpoint": request.endpoint,
        "params": request.params,
    }))
}
