pub mod config;
pub mod errors;
pub mod retry;

pub use config::{
    ApiConfig, AppConfig, AuditConfig, DatabaseConfig, LifecycleConfig, ObservabilityConfig,
    RetryConfig,
};
pub use errors::{MarketError, MarketResult};
pub use retry::retry_with_backoff;
