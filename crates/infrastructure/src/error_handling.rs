//! 仓储层错误处理
//!
//! 将 sqlx 错误转换为 `MarketError`，并附带操作上下文记录日志。
//! 行锁等待超时、死锁和序列化失败统一归类为可重试的 `Contention`。

use std::fmt;

use gigmarket_core::MarketError;
use sqlx::Error as SqlxError;
use tracing::{error, warn};

/// 仓储操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Claim,
    Sweep,
    Migrate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "读取"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "查询"),
            RepositoryOperation::Claim => write!(f, "认领"),
            RepositoryOperation::Sweep => write!(f, "自动解封"),
            RepositoryOperation::Migrate => write!(f, "初始化"),
        }
    }
}

/// 仓储操作上下文
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: &'static str,
    pub id: Option<i64>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: &'static str) -> Self {
        Self {
            operation,
            entity,
            id: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn entity_description(&self) -> String {
        match self.id {
            Some(id) => format!("{} (ID: {})", self.entity, id),
            None => self.entity.to_string(),
        }
    }
}

/// 构造仓储上下文的快捷宏
#[macro_export]
macro_rules! repo_context {
    ($op:expr, $entity:expr) => {
        $crate::error_handling::OperationContext::new($op, $entity)
    };
    ($op:expr, $entity:expr, $id:expr) => {
        $crate::error_handling::OperationContext::new($op, $entity).with_id($id)
    };
}

const SQLITE_CONTENTION_CODES: &[&str] = &["5", "6", "261", "262", "517"];
const POSTGRES_CONTENTION_CODES: &[&str] = &["55P03", "40001", "40P01"];

/// 锁等待超时或事务冲突，重试可能成功
pub fn is_contention(error: &SqlxError) -> bool {
    match error {
        SqlxError::Database(db_error) => {
            let code_matches = db_error.code().is_some_and(|code| {
                SQLITE_CONTENTION_CODES.contains(&code.as_ref())
                    || POSTGRES_CONTENTION_CODES.contains(&code.as_ref())
            });
            code_matches || db_error.message().contains("database is locked")
        }
        _ => false,
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    pub fn database_error(context: OperationContext, error: SqlxError) -> MarketError {
        let entity_desc = context.entity_description();

        if is_contention(&error) {
            let msg = format!("{}{}时等待锁超时: {}", context.operation, entity_desc, error);
            warn!(error = %error, "{}", msg);
            return MarketError::contention(msg);
        }

        match &error {
            SqlxError::Database(db_error) => match db_error.constraint() {
                Some(constraint) => error!(
                    error = %error,
                    constraint = constraint,
                    "{}{}时发生数据库约束冲突",
                    context.operation,
                    entity_desc
                ),
                None => error!(
                    error = %error,
                    "{}{}时发生数据库错误",
                    context.operation,
                    entity_desc
                ),
            },
            SqlxError::PoolTimedOut => {
                error!("{}{}时数据库连接池超时", context.operation, entity_desc)
            }
            SqlxError::PoolClosed => {
                error!("{}{}时数据库连接池已关闭", context.operation, entity_desc)
            }
            _ => error!(
                error = %error,
                "{}{}时发生未知数据库错误",
                context.operation,
                entity_desc
            ),
        }
        MarketError::Database(error)
    }

    /// 数据库中存在无法解析的数据
    pub fn corrupted_data(context: &OperationContext, detail: impl fmt::Display) -> MarketError {
        let msg = format!(
            "{}{}时读取到无效数据: {}",
            context.operation,
            context.entity_description(),
            detail
        );
        error!("{}", msg);
        MarketError::internal(msg)
    }
}

/// `map_err` 的简写
pub fn db_err(context: OperationContext) -> impl FnOnce(SqlxError) -> MarketError {
    move |error| RepositoryErrorHelpers::database_error(context, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_description() {
        let ctx = repo_context!(RepositoryOperation::Claim, "订单", 7);
        assert_eq!(ctx.entity_description(), "订单 (ID: 7)");
        assert_eq!(ctx.operation.to_string(), "认领");

        let ctx = repo_context!(RepositoryOperation::Sweep, "用户");
        assert_eq!(ctx.entity_description(), "用户");
    }

    #[test]
    fn test_non_database_errors_are_not_contention() {
        assert!(!is_contention(&SqlxError::PoolTimedOut));
        assert!(!is_contention(&SqlxError::RowNotFound));

        let err = RepositoryErrorHelpers::database_error(
            repo_context!(RepositoryOperation::Read, "订单", 1),
            SqlxError::PoolTimedOut,
        );
        assert!(matches!(err, MarketError::Database(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_sqlite_busy_is_contention() {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("busy.db").display());
        let options = SqliteConnectOptions::from_str(&url)
            .unwrap()
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(20));
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        let mut holder = pool.begin().await.unwrap();
        sqlx::query("INSERT INTO t (id) VALUES (1)")
            .execute(&mut *holder)
            .await
            .unwrap();

        let err = sqlx::query("INSERT INTO t (id) VALUES (2)")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(is_contention(&err));

        let classified = RepositoryErrorHelpers::database_error(
            repo_context!(RepositoryOperation::Claim, "订单", 2),
            err,
        );
        assert!(matches!(classified, MarketError::Contention(_)));
        holder.rollback().await.unwrap();
    }
}
