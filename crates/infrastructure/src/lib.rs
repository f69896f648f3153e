//! 基础设施层：SQLite/PostgreSQL 仓储实现、审计日志写入器与自动解封任务

pub mod audit_worker;
pub mod database;
pub mod error_handling;
pub mod unblock_sweep_service;

pub use audit_worker::AuditLogWorker;
pub use database::*;
pub use error_handling::{is_contention, OperationContext, RepositoryErrorHelpers, RepositoryOperation};
pub use unblock_sweep_service::UnblockSweepService;
