use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use gigmarket_core::{DatabaseConfig, MarketResult};
use gigmarket_domain::{
    AuditLogRepository, OrderRepository, SpecialityCatalog, TeamRepository, UserDirectory,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info};

use super::postgres::{
    PostgresAuditLogRepository, PostgresOrderRepository, PostgresTeamRepository,
    PostgresUserDirectory,
};
use super::schema::{POSTGRES_SCHEMA, SQLITE_SCHEMA};
use super::sqlite::{
    SqliteAuditLogRepository, SqliteOrderRepository, SqliteTeamRepository, SqliteUserDirectory,
};
use crate::error_handling::{db_err, RepositoryOperation};
use crate::repo_context;

/// 根据连接URL识别数据库类型
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::PostgreSQL
        } else {
            DatabaseType::SQLite
        }
    }
}

pub enum DatabasePool {
    PostgreSQL(sqlx::PgPool),
    SQLite(sqlx::SqlitePool),
}

impl DatabasePool {
    /// 按配置创建连接池
    ///
    /// SQLite 启用外键和 WAL，busy_timeout 取认领锁等待上限。
    pub async fn new(config: &DatabaseConfig) -> MarketResult<Self> {
        let ctx = repo_context!(RepositoryOperation::Migrate, "数据库连接池");

        match DatabaseType::from_url(&config.url) {
            DatabaseType::PostgreSQL => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
                    .connect(&config.url)
                    .await
                    .map_err(db_err(ctx))?;
                Ok(DatabasePool::PostgreSQL(pool))
            }
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::from_str(&config.url)
                    .map_err(db_err(ctx.clone()))?
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(config.lock_timeout());
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
                    .connect_with(options)
                    .await
                    .map_err(db_err(ctx))?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            DatabasePool::PostgreSQL(_) => DatabaseType::PostgreSQL,
            DatabasePool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub async fn health_check(&self) -> MarketResult<()> {
        let ctx = repo_context!(RepositoryOperation::Query, "数据库健康检查");
        match self {
            DatabasePool::PostgreSQL(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(db_err(ctx))?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(db_err(ctx))?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::PostgreSQL(pool) => pool.close().await,
            DatabasePool::SQLite(pool) => pool.close().await,
        }
    }
}

/// 统一的数据库管理器，负责连接池、建表和仓储构造
pub struct DatabaseManager {
    pool: DatabasePool,
    lock_timeout: Duration,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> MarketResult<Self> {
        let pool = DatabasePool::new(config).await?;
        info!(
            "数据库连接已建立: {:?} (最大连接数: {})",
            pool.database_type(),
            config.max_connections
        );
        Ok(Self {
            pool,
            lock_timeout: config.lock_timeout(),
        })
    }

    pub fn database_type(&self) -> DatabaseType {
        self.pool.database_type()
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn health_check(&self) -> MarketResult<()> {
        self.pool.health_check().await
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    /// 幂等建表
    pub async fn initialize_schema(&self) -> MarketResult<()> {
        let ctx = repo_context!(RepositoryOperation::Migrate, "数据库表结构");
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                for statement in POSTGRES_SCHEMA {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(db_err(ctx.clone()))?;
                }
            }
            DatabasePool::SQLite(pool) => {
                for statement in SQLITE_SCHEMA {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(db_err(ctx.clone()))?;
                }
            }
        }
        debug!("数据库表结构初始化完成: {:?}", self.database_type());
        Ok(())
    }

    pub fn order_repository(&self) -> Arc<dyn OrderRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                Arc::new(PostgresOrderRepository::new(pool.clone(), self.lock_timeout))
            }
            DatabasePool::SQLite(pool) => Arc::new(SqliteOrderRepository::new(pool.clone())),
        }
    }

    pub fn team_repository(&self) -> Arc<dyn TeamRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresTeamRepository::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteTeamRepository::new(pool.clone())),
        }
    }

    pub fn user_directory(&self) -> Arc<dyn UserDirectory> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresUserDirectory::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteUserDirectory::new(pool.clone())),
        }
    }

    pub fn speciality_catalog(&self) -> Arc<dyn SpecialityCatalog> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresUserDirectory::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteUserDirectory::new(pool.clone())),
        }
    }

    pub fn audit_log_repository(&self) -> Arc<dyn AuditLogRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                Arc::new(PostgresAuditLogRepository::new(pool.clone()))
            }
            DatabasePool::SQLite(pool) => Arc::new(SqliteAuditLogRepository::new(pool.clone())),
        }
    }
}
