//! Core gateway orchestration service.
//!
//! The `GatewayService` aggregates immutable configuration (`GatewayConfig`)
//! with runtime state (compiled route matchers, the shared rate limiter).
//! It provides:
//! * First-match route lookup with path parameter extraction
//! * Per-route rate limit enforcement
//!
//! This layer deliberately avoids I/O and only manipulates in-memory data so
//! it remains fast and easily testable in isolation.
use std::{collections::HashMap, sync::Arc};

use crate::{
    config::models::{Aggregation, GatewayConfig},
    core::{rate_limiter::FixedWindowLimiter, route::CompiledRoute},
};

/// One route table entry: the compiled matcher next to its aggregation.
struct RouteEntry {
    matcher: CompiledRoute,
    aggregation: Aggregation,
}

/// Central orchestrator for route matching and per-route rate limiting.
///
/// Construct with [`GatewayService::new`] by passing an `Arc<GatewayConfig>`.
/// Route patterns are compiled up front so lookups stay fast in the hot path;
/// the rate-limiter slot map is the only mutable state.
pub struct GatewayService {
    config: Arc<GatewayConfig>,
    routes: Vec<RouteEntry>,
    rate_limiter: FixedWindowLimiter,
}

impl GatewayService {
    /// Create a new gateway service from a validated configuration.
    ///
    /// Aggregations whose pattern fails to compile are dropped from the route
    /// table with an error log; validation upstream makes this unreachable
    /// for configs that passed the loader.
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        let mut routes = Vec::with_capacity(config.aggregations.len());
        for aggregation in &config.aggregations {
            match CompiledRoute::new(&aggregation.path) {
                Ok(matcher) => routes.push(RouteEntry {
                    matcher,
                    aggregation: aggregation.clone(),
                }),
                Err(e) => {
                    tracing::error!(pattern = %aggregation.path, error = %e, "invalid route pattern");
                }
            }
        }

        Self {
            config,
            routes,
            rate_limiter: FixedWindowLimiter::new(),
        }
    }

    /// The configuration this service was built from.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Find the first aggregation matching an incoming path, in declaration
    /// order, together with its extracted path parameters.
    pub fn find_matching_route(
        &self,
        path: &str,
    ) -> Option<(&Aggregation, HashMap<String, String>)> {
        self.routes.iter().find_map(|entry| {
            entry
                .matcher
                .matches(path)
                .map(|params| (&entry.aggregation, params))
        })
    }

    /// Enforce the aggregation's rate limit, if one is active. The limiter is
    /// keyed by the route pattern, so the limit is global per route.
    pub fn check_rate_limit(&self, aggregation: &Aggregation) -> bool {
        match aggregation.active_rate_limit() {
            Some(rate_limit) => {
                self.rate_limiter
                    .allow(&aggregation.path, rate_limit.limit, rate_limit.interval)
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{Call, RateLimitConfig};

    fn aggregation(path: &str) -> Aggregation {
        Aggregation {
            path: path.to_string(),
            calls: vec![Call {
                name: "svc".to_string(),
                backend: "http://svc/".to_string(),
                required: false,
                params: HashMap::new(),
            }],
            response: None,
            rate_limit: None,
        }
    }

    fn service(aggregations: Vec<Aggregation>) -> GatewayService {
        GatewayService::new(Arc::new(GatewayConfig {
            listen_addr: "127.0.0.1:8080".to_string(),
            aggregations,
        }))
    }

    #[test]
    fn test_first_match_wins_in_declaration_order() {
        let gateway = service(vec![aggregation("/u/{id}"), aggregation("/u/admin")]);

        // Even though the second pattern matches literally, the first one
        // declared takes the request.
        let (matched, params) = gateway.find_matching_route("/u/admin").unwrap();
        assert_eq!(matched.path, "/u/{id}");
        assert_eq!(params["id"], "admin");
    }

    #[test]
    fn test_no_match_returns_none() {
        let gateway = service(vec![aggregation("/a"), aggregation("/b/{id}")]);
        assert!(gateway.find_matching_route("/c").is_none());
        assert!(gateway.find_matching_route("/b").is_none());
    }

    #[test]
    fn test_rate_limit_enforced_per_route() {
        let mut limited = aggregation("/limited");
        limited.rate_limit = Some(RateLimitConfig {
            limit: 2,
            interval: 60,
        });
        let gateway = service(vec![limited.clone(), aggregation("/open")]);

        assert!(gateway.check_rate_limit(&limited));
        assert!(gateway.check_rate_limit(&limited));
        assert!(!gateway.check_rate_limit(&limited));

        // Routes without an active limit are never throttled.
        let open = aggregation("/open");
        for _ in 0..10 {
            assert!(gateway.check_rate_limit(&open));
        }
    }

    #[test]
    fn test_disabled_rate_limit_admits_everything() {
        let mut route = aggregation("/x");
        route.rate_limit = Some(RateLimitConfig {
            limit: 0,
            interval: 0,
        });
        let gateway = service(vec![route.clone()]);
        for _ in 0..5 {
            assert!(gateway.check_rate_limit(&route));
        }
    }
}
