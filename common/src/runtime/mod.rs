pub mod connection_pool;
pub mod perf_monitor;
pub mod rate_limiter;

pub use connection_pool::ConnectionPool;
pub use perf_monitor::PerformanceMonitor;
pub use rate_limiter::RateLimiter;

use std::sync::Arc;

use crate::config::PerformanceConfig;

/// The process-wide runtime services bundle (spec.md §9 "Global state"):
/// constructed once at startup from config and passed into components
/// explicitly, rather than reached for as an ambient global.
#[derive(Clone)]
pub struct RuntimeServices {
    pub rate_limiter: Arc<RateLimiter>,
    pub connection_pool: Arc<ConnectionPool>,
    pub perf_monitor: Arc<PerformanceMonitor>,
}

impl RuntimeServices {
    #[must_use]
    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self {
            rate_limiter: Arc::new(RateLimiter::new(
                config.requests_per_minute,
                config.tokens_per_minute,
                config.rate_limit_safety_margin,
            )),
            connection_pool: Arc::new(ConnectionPool::new(config.max_connections)),
            perf_monitor: Arc::new(PerformanceMonitor::new()),
        }
    }
}
