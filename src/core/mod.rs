pub mod aggregator;
pub mod gateway;
pub mod params;
pub mod rate_limiter;
pub mod route;

pub use aggregator::Aggregator;
pub use gateway::GatewayService;
pub use rate_limiter::FixedWindowLimiter;
pub use route::CompiledRoute;
