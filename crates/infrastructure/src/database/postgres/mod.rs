pub(crate) mod rows;
pub mod postgres_audit_log_repository;
pub mod postgres_order_repository;
pub mod postgres_team_repository;
pub mod postgres_user_directory;

pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_order_repository::{PostgresClaimTransaction, PostgresOrderRepository};
pub use postgres_team_repository::PostgresTeamRepository;
pub use postgres_user_directory::PostgresUserDirectory;
