//! Concurrent fan-out over an aggregation's backend calls.
//!
//! For each matched route the aggregator resolves one URL per call, fires all
//! resolvable calls as independent tasks, and joins on the whole set before
//! the response is shaped. Individual call failures never abort the
//! aggregation; they are collected as error records instead.
use std::{collections::HashMap, sync::Arc};

use axum::body::Body as AxumBody;
use http_body_util::BodyExt;
use hyper::{Method, Request};
use serde_json::{Map, Value, json};
use tokio::task::JoinSet;

use crate::{
    config::models::Aggregation,
    core::params::{RequestParams, build_backend_url},
    ports::http_client::HttpClient,
};

/// One entry of the `error` array in an aggregated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// The failed call's name.
    pub service: String,
    /// Failure kind, as reported to the caller.
    pub error: String,
    /// Mirrors the call's `required` flag.
    pub critical: bool,
}

impl ErrorRecord {
    fn to_json(&self) -> Value {
        json!({
            "service": self.service,
            "error": self.error,
            "critical": self.critical,
        })
    }
}

/// How a dispatched fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchFailure {
    /// Transport-layer failure: DNS, connect, timeout, reset.
    Unavailable,
    /// The response body could not be read after headers arrived.
    UnreadableBody,
    /// The body was read but did not parse as JSON.
    InvalidJson,
}

impl FetchFailure {
    fn message(self) -> &'static str {
        match self {
            Self::Unavailable => "Service unavailable",
            Self::UnreadableBody => "Invalid response from service",
            Self::InvalidJson => "Invalid JSON response",
        }
    }
}

/// Fans an aggregation's calls out to their backends and merges the results.
/// Cheap to clone (shares the client).
#[derive(Clone)]
pub struct Aggregator {
    client: Arc<dyn HttpClient>,
}

impl Aggregator {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Run all calls of `route` and build the aggregated response object.
    ///
    /// Calls whose URL cannot be materialized are reported without being
    /// dispatched. Everything else runs concurrently; the join below is the
    /// barrier that keeps one slow backend from being dropped from the
    /// response. Error records keep parameter failures first (declaration
    /// order), then fetch failures in completion order.
    pub async fn aggregate(&self, route: &Aggregation, params: &RequestParams) -> Map<String, Value> {
        let mut results: Map<String, Value> = Map::new();
        let mut errors: Vec<ErrorRecord> = Vec::new();

        let mut tasks: JoinSet<(String, bool, Result<Value, FetchFailure>)> = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, (String, bool)> = HashMap::new();

        for call in &route.calls {
            let url = match build_backend_url(call, params) {
                Ok(url) => url,
                Err(missing) => {
                    tracing::warn!(
                        call = %call.name,
                        placeholder = %missing.placeholder,
                        "missing parameter for backend call"
                    );
                    errors.push(ErrorRecord {
                        service: call.name.clone(),
                        error: missing.to_string(),
                        critical: call.required,
                    });
                    if !call.required {
                        results.insert(call.name.clone(), Value::Null);
                    }
                    continue;
                }
            };

            let client = self.client.clone();
            let name = call.name.clone();
            let required = call.required;
            let handle = tasks.spawn(async move {
                let outcome = fetch_json(client.as_ref(), &name, &url).await;
                (name, required, outcome)
            });
            spawned.insert(handle.id(), (call.name.clone(), call.required));
        }

        while let Some(joined) = tasks.join_next().await {
            let (name, required, outcome) = match joined {
                Ok(completed) => completed,
                Err(join_error) => {
                    // A panicked fetch task is contained here; the call is
                    // reported as unavailable and the request carries on.
                    tracing::error!(error = %join_error, "fetch task aborted");
                    match spawned.get(&join_error.id()) {
                        Some((name, required)) => {
                            (name.clone(), *required, Err(FetchFailure::Unavailable))
                        }
                        None => continue,
                    }
                }
            };

            match outcome {
                Ok(value) => {
                    results.insert(name, value);
                }
                Err(failure) => {
                    errors.push(ErrorRecord {
                        service: name.clone(),
                        error: failure.message().to_string(),
                        critical: required,
                    });
                    if !required {
                        results.insert(name, Value::Null);
                    }
                }
            }
        }

        if let Some(mapping) = &route.response {
            if !mapping.structure.is_empty() {
                results.retain(|key, _| mapping.structure.contains_key(key));
            }
        }

        if !errors.is_empty() {
            results.insert(
                "error".to_string(),
                Value::Array(errors.iter().map(ErrorRecord::to_json).collect()),
            );
        }

        results
    }
}

/// Issue one GET and classify the outcome.
///
/// Any JSON body is a success regardless of status code; the body is
/// forwarded verbatim under the call's name.
async fn fetch_json(
    client: &dyn HttpClient,
    call_name: &str,
    url: &str,
) -> Result<Value, FetchFailure> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(url)
        .body(AxumBody::empty())
        .map_err(|e| {
            tracing::warn!(call = %call_name, url, error = %e, "could not build backend request");
            FetchFailure::Unavailable
        })?;

    let response = client.send_request(request).await.map_err(|e| {
        tracing::warn!(call = %call_name, url, error = %e, "backend request failed");
        FetchFailure::Unavailable
    })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| {
            tracing::warn!(call = %call_name, url, error = %e, "failed reading backend response");
            FetchFailure::UnreadableBody
        })?
        .to_bytes();

    let value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(call = %call_name, url, error = %e, "backend returned invalid JSON");
        FetchFailure::InvalidJson
    })?;

    tracing::debug!(call = %call_name, status = status.as_u16(), "backend response accepted");
    Ok(value)
}
