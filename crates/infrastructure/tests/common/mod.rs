#![allow(dead_code)]

use std::sync::Arc;

use gigmarket_core::DatabaseConfig;
use gigmarket_domain::{AssignmentService, EligibilityService, OrderLifecycleService, TeamRegistry};
use gigmarket_infrastructure::{DatabaseManager, DatabasePool};
use gigmarket_testing_utils::RecordingAuditLog;
use tempfile::TempDir;

/// 与内存市场 `TestServices::seeded()` 相同的用户与专长
pub const SEED: &[&str] = &[
    "INSERT INTO users (id, username, first_name, last_name, is_blocked) VALUES (100, 'customer100', 'Ivan', 'Petrov', FALSE)",
    "INSERT INTO users (id, username, first_name, is_blocked) VALUES (1, 'performer1', 'Anna', FALSE)",
    "INSERT INTO users (id, username, is_blocked) VALUES (2, 'performer2', FALSE)",
    "INSERT INTO users (id, username, photo_link, is_blocked) VALUES (3, 'performer3', 'https://cdn.example.com/3.png', FALSE)",
    "INSERT INTO specialities (name) VALUES ('designer'), ('smm'), ('copywriter')",
    "INSERT INTO tags (name) VALUES ('design'), ('marketing'), ('writing')",
    "INSERT INTO specialities_tags (speciality_id, tag_id) SELECT s.id, t.id FROM specialities s, tags t WHERE s.name = 'designer' AND t.name = 'design'",
    "INSERT INTO specialities_tags (speciality_id, tag_id) SELECT s.id, t.id FROM specialities s, tags t WHERE s.name = 'smm' AND t.name = 'marketing'",
    "INSERT INTO specialities_tags (speciality_id, tag_id) SELECT s.id, t.id FROM specialities s, tags t WHERE s.name = 'copywriter' AND t.name = 'writing'",
    "INSERT INTO users_specialities (user_id, speciality_id) SELECT 1, id FROM specialities WHERE name IN ('designer', 'smm')",
    "INSERT INTO users_specialities (user_id, speciality_id) SELECT 2, id FROM specialities WHERE name = 'copywriter'",
    "INSERT INTO users_specialities (user_id, speciality_id) SELECT 3, id FROM specialities WHERE name = 'designer'",
];

pub async fn execute(pool: &DatabasePool, sql: &str) {
    match pool {
        DatabasePool::SQLite(pool) => {
            sqlx::query(sql).execute(pool).await.unwrap();
        }
        DatabasePool::PostgreSQL(pool) => {
            sqlx::query(sql).execute(pool).await.unwrap();
        }
    }
}

pub async fn count(pool: &DatabasePool, sql: &str) -> i64 {
    match pool {
        DatabasePool::SQLite(pool) => sqlx::query_scalar(sql).fetch_one(pool).await.unwrap(),
        DatabasePool::PostgreSQL(pool) => sqlx::query_scalar(sql).fetch_one(pool).await.unwrap(),
    }
}

/// 领域服务直接挂在数据库仓储上
pub struct DbServices {
    pub manager: Arc<DatabaseManager>,
    pub audit: Arc<RecordingAuditLog>,
    pub eligibility: Arc<EligibilityService>,
    pub assignment: Arc<AssignmentService>,
    pub teams: Arc<TeamRegistry>,
    pub lifecycle: Arc<OrderLifecycleService>,
}

impl DbServices {
    pub async fn seeded(manager: DatabaseManager) -> Self {
        manager.initialize_schema().await.unwrap();
        for statement in SEED {
            execute(manager.pool(), statement).await;
        }

        let orders = manager.order_repository();
        let users = manager.user_directory();
        let catalog = manager.speciality_catalog();
        let audit = Arc::new(RecordingAuditLog::new());

        let teams = Arc::new(TeamRegistry::new(manager.team_repository(), users.clone()));
        let eligibility = Arc::new(EligibilityService::new(
            orders.clone(),
            users.clone(),
            catalog.clone(),
        ));
        let assignment = Arc::new(AssignmentService::new(
            orders.clone(),
            users.clone(),
            catalog,
            teams.clone(),
        ));
        let lifecycle = Arc::new(OrderLifecycleService::new(orders, users, audit.clone(), 30));

        Self {
            manager: Arc::new(manager),
            audit,
            eligibility,
            assignment,
            teams,
            lifecycle,
        }
    }
}

/// 临时目录中的 SQLite 数据库，目录随返回值一起释放
pub async fn sqlite_manager(lock_timeout_ms: u64) -> (TempDir, DatabaseManager) {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite:{}", dir.path().join("gigmarket.db").display()),
        lock_timeout_ms,
        ..DatabaseConfig::default()
    };
    let manager = DatabaseManager::new(&config).await.unwrap();
    (dir, manager)
}
