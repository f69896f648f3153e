pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod lifecycle;
pub mod resilience;

pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use lifecycle::{AuditConfig, LifecycleConfig};
pub use resilience::RetryConfig;
