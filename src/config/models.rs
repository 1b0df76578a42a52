//! Configuration data structures for Dendrite.
//!
//! These types map directly to YAML (also JSON / TOML) configuration files. They are
//! intentionally serde‑friendly and include defaults so that minimal configs remain concise.
//! The builder is considered part of the public API for embedding.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

/// Root configuration document: the server bind address plus the ordered list
/// of aggregation routes. Immutable after load.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub aggregations: Vec<Aggregation>,
}

impl GatewayConfig {
    /// Create a new gateway configuration builder
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            aggregations: Vec::new(),
        }
    }
}

/// One public route: a URL pattern with `{name}` placeholders, the backend
/// calls it fans out to, an optional response mapping, and an optional
/// per-route rate limit.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Aggregation {
    pub path: String,
    pub calls: Vec<Call>,
    #[serde(default)]
    pub response: Option<ResponseMapping>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Aggregation {
    /// The rate limit to enforce for this route, if one is configured and active.
    pub fn active_rate_limit(&self) -> Option<&RateLimitConfig> {
        self.rate_limit.as_ref().filter(|rl| rl.is_active())
    }
}

/// One backend invocation contributing one key to the aggregated response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Call {
    /// Unique name within the aggregation; becomes a key in the response object.
    pub name: String,
    /// URL template with `{name}` placeholders.
    pub backend: String,
    /// Whether a failure of this call is critical. A required call's failure
    /// is reported in `error` without a `name: null` placeholder.
    #[serde(default)]
    pub required: bool,
    /// Explicit placeholder bindings: placeholder name to a `$path.X`,
    /// `$query.X` or `$header.X` source reference.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Declares which call names (plus the reserved key `error`) appear in the
/// output object. An empty structure applies no filtering.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ResponseMapping {
    #[serde(default)]
    pub structure: HashMap<String, String>,
}

/// Per-route fixed-window rate limit. Both fields zero disables limiting.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Admitted requests per window. 0 disables.
    pub limit: u64,
    /// Window length in seconds.
    pub interval: u64,
}

impl RateLimitConfig {
    /// Whether this configuration actually limits anything.
    pub fn is_active(&self) -> bool {
        self.limit > 0 && self.interval > 0
    }
}

/// Builder for GatewayConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct GatewayConfigBuilder {
    listen_addr: Option<String>,
    aggregations: Vec<Aggregation>,
}

impl GatewayConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Append an aggregation route. Declaration order is match order.
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    /// Build the final GatewayConfig
    pub fn build(self) -> Result<GatewayConfig, String> {
        if self.aggregations.is_empty() {
            return Err("At least one aggregation must be configured".to_string());
        }

        Ok(GatewayConfig {
            listen_addr: self.listen_addr.unwrap_or_else(default_listen_addr),
            aggregations: self.aggregations,
        })
    }
}
