//! 配置管理
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件（显式路径或默认搜索路径）
//! 3. `GIGMARKET_` 前缀的环境变量，层级之间用 `__` 分隔，
//!    例如 `GIGMARKET_DATABASE__LOCK_TIMEOUT_MS=500`
//!
//! 加载完成后对每个配置段执行 `validate()`。

pub mod models;

pub use models::{
    ApiConfig, AppConfig, AuditConfig, DatabaseConfig, LifecycleConfig, ObservabilityConfig,
    RetryConfig,
};
