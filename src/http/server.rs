//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway as the only handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::proxy::Gateway;
use crate::transport::{HttpTransport, Transport, TransportError};

/// HTTP server for the proxy gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl HttpServer {
    /// Create a server that fetches over the network.
    pub fn new(config: GatewayConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config.transport)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a server on top of any transport.
    pub fn with_transport<T: Transport>(config: GatewayConfig, transport: T) -> Self {
        let gateway = Arc::new(Gateway::new(&config, transport));
        let router = Self::build_router(&config, gateway);
        Self {
            router,
            config: Arc::new(config),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<T: Transport>(config: &GatewayConfig, gateway: Arc<Gateway<T>>) -> Router {
        Router::new()
            .fallback(gateway_handler::<T>)
            .with_state(gateway)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The router, for serving it elsewhere or driving it directly.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            prefix = %self.config.proxy.prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn gateway_handler<T: Transport>(
    State(gateway): State<Arc<Gateway<T>>>,
    request: Request<Body>,
) -> Response {
    gateway.handle(request).await
}
