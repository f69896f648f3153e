pub(crate) mod rows;
pub mod sqlite_audit_log_repository;
pub mod sqlite_order_repository;
pub mod sqlite_team_repository;
pub mod sqlite_user_directory;

pub use sqlite_audit_log_repository::SqliteAuditLogRepository;
pub use sqlite_order_repository::{SqliteClaimTransaction, SqliteOrderRepository};
pub use sqlite_team_repository::SqliteTeamRepository;
pub use sqlite_user_directory::SqliteUserDirectory;
