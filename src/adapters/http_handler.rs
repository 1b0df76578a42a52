use std::{sync::Arc, time::Instant};

use axum::{
    body::Body as AxumBody,
    http::{StatusCode, header},
};
use eyre::{Result, WrapErr};
use hyper::{Request, Response};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    core::{Aggregator, GatewayService, params::RequestParams},
    ports::http_client::HttpClient,
    tracing_setup,
};

/// HTTP handler for the Dendrite aggregation gateway.
///
/// Stateless per request: matches the path against the configured
/// aggregations, enforces the route's rate limit, runs the fan-out and
/// serializes the merged object. The rate limiter inside the gateway service
/// is the only shared mutable state it touches.
pub struct HttpHandler {
    gateway_service: Arc<GatewayService>,
    aggregator: Aggregator,
}

impl HttpHandler {
    pub fn new(gateway_service: Arc<GatewayService>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            gateway_service,
            aggregator: Aggregator::new(http_client),
        }
    }

    /// Main request handler wrapping routing with a request span and
    /// completion logging.
    pub async fn handle_request(
        &self,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, eyre::Error> {
        let start_time = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let request_id = Uuid::new_v4().to_string();

        let span = tracing_setup::create_request_span(method.as_str(), &path, &request_id);

        let result: Result<Response<AxumBody>, eyre::Error> =
            async { self.route_request(req).await }.instrument(span).await;

        let duration = start_time.elapsed();
        match &result {
            Ok(response) => {
                tracing::info!(
                    status = response.status().as_u16(),
                    duration_ms = duration.as_millis() as u64,
                    "request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "request failed"
                );
            }
        }

        result
    }

    /// Route request to the first matching aggregation
    async fn route_request(
        &self,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, eyre::Error> {
        let path = req.uri().path();

        let Some((aggregation, path_params)) = self.gateway_service.find_matching_route(path)
        else {
            tracing::debug!("no route match");
            return Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(AxumBody::from("Route not found"))
                .wrap_err("Failed to build 404 response");
        };

        tracing::Span::current().record("route.pattern", aggregation.path.as_str());

        if !self.gateway_service.check_rate_limit(aggregation) {
            tracing::warn!(pattern = %aggregation.path, "rate limit exceeded");
            return Response::builder()
                .status(StatusCode::TOO_MANY_REQUESTS)
                .body(AxumBody::from("429 - Too Many Requests"))
                .wrap_err("Failed to build 429 response");
        }

        let params = RequestParams::new(path_params, req.uri(), req.headers());
        let aggregated = self.aggregator.aggregate(aggregation, &params).await;

        let body = serde_json::to_vec(&Value::Object(aggregated))
            .wrap_err("Failed to serialize aggregated response")?;

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(AxumBody::from(body))
            .wrap_err("Failed to build aggregation response")
    }
}

impl Clone for HttpHandler {
    fn clone(&self) -> Self {
        Self {
            gateway_service: self.gateway_service.clone(),
            aggregator: self.aggregator.clone(),
        }
    }
}
