//! Dendrite - a declarative HTTP aggregation gateway.
//!
//! Dendrite exposes configured *aggregation routes*: each route is a single
//! public URL path that, when invoked, fans out to several backend HTTP
//! services in parallel, collects their JSON responses, and returns one
//! merged JSON object. A per-route fixed-window rate limiter protects the
//! upstreams. The crate implements a **hexagonal architecture** and exposes
//! the core building blocks so you can embed the gateway or compose parts of
//! it inside your own application.
//!
//! # Features
//! - Parameterized route patterns (`/users/{id}/profile`) with path capture
//! - Backend URL templates fed from path, query, and header parameters
//! - Concurrent fan-out with per-call criticality and partial-failure records
//! - Per-route fixed-window rate limiting
//! - Declarative response shaping
//! - Multi-format configuration (YAML / JSON / TOML) with load-time validation
//! - Structured tracing via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use dendrite::Gateway;
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! // Load a configuration (see README for the document format)
//! let gateway = Gateway::from_config_path("config.yaml")?;
//! let listener = tokio::net::TcpListener::bind(gateway.listen_addr()).await?;
//! axum::serve(listener, gateway.into_router()).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping business logic inside `core`. End users should prefer the
//! re-exports documented below instead of reaching into internal modules
//! directly.
//!
//! # Error Handling
//! All fallible APIs return `eyre::Result<T>` or a domain specific error type.
//! Backend call failures never fail a request; they surface as records in the
//! aggregated object's `error` array.
//!
//! # License
//! Dual-licensed under either MIT or Apache-2.0 at your option.
use std::sync::Arc;

use axum::{
    Router,
    body::Body as AxumBody,
    extract::Request,
    response::Response,
    routing::any,
};
use eyre::{Context, Result};

pub mod config;
pub mod ports;
pub mod tracing_setup;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpClientAdapter, HttpHandler},
    core::GatewayService,
    ports::http_client::HttpClient,
};

/// A fully assembled gateway: validated configuration, compiled routes, and
/// the request handler, ready to serve.
pub struct Gateway {
    gateway_service: Arc<GatewayService>,
    handler: Arc<HttpHandler>,
    listen_addr: String,
}

impl Gateway {
    /// Load and validate the configuration file at `config_path` and build
    /// the servable gateway from it.
    pub fn from_config_path(config_path: &str) -> Result<Self> {
        let config = config::load_config(config_path)
            .with_context(|| format!("Failed to load configuration from {config_path}"))?;
        Self::from_config(config)
    }

    /// Build the gateway from an already validated configuration.
    pub fn from_config(config: config::models::GatewayConfig) -> Result<Self> {
        let listen_addr = config.listen_addr.clone();
        let gateway_service = Arc::new(GatewayService::new(Arc::new(config)));
        let http_client: Arc<dyn HttpClient> =
            Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client adapter")?);
        let handler = Arc::new(HttpHandler::new(gateway_service.clone(), http_client));

        Ok(Self {
            gateway_service,
            handler,
            listen_addr,
        })
    }

    /// The configured bind address.
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// The validated configuration this gateway serves.
    pub fn config(&self) -> &config::models::GatewayConfig {
        self.gateway_service.config()
    }

    /// The shared request handler.
    pub fn handler(&self) -> Arc<HttpHandler> {
        self.handler.clone()
    }

    /// Wrap the handler into an axum `Router` serving every path.
    pub fn into_router(self) -> Router {
        let make_request_route = |handler: Arc<HttpHandler>| {
            any(move |req: Request| {
                let handler = handler.clone();
                async move {
                    match handler.handle_request(req).await {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::error!("Request handling error: {:?}", e);
                            Response::builder()
                                .status(500)
                                .body(AxumBody::from("Internal Server Error"))
                                .unwrap_or_else(|_| {
                                    Response::new(AxumBody::from("Internal Server Error"))
                                })
                        }
                    }
                }
            })
        };

        Router::new()
            .route("/{*path}", make_request_route(self.handler.clone()))
            .route("/", make_request_route(self.handler))
    }
}
