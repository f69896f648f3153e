pub mod manager;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use manager::{DatabaseManager, DatabasePool, DatabaseType};
pub use postgres::{
    PostgresAuditLogRepository, PostgresOrderRepository, PostgresTeamRepository,
    PostgresUserDirectory,
};
pub use sqlite::{
    SqliteAuditLogRepository, SqliteOrderRepository, SqliteTeamRepository, SqliteUserDirectory,
};
