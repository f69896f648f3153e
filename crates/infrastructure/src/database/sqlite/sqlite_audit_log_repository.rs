use async_trait::async_trait;
use gigmarket_core::MarketResult;
use gigmarket_domain::{AuditLogRepository, PriceEvent};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::rows::price_text;
use crate::error_handling::{db_err, RepositoryOperation};
use crate::repo_context;

pub struct SqliteAuditLogRepository {
    pool: SqlitePool,
}

impl SqliteAuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for SqliteAuditLogRepository {
    #[instrument(skip(self, event), fields(order_id = %event.order_id, kind = event.kind.as_str()))]
    async fn insert(&self, event: &PriceEvent) -> MarketResult<()> {
        let ctx = repo_context!(RepositoryOperation::Create, "审计日志", event.order_id);
        let tags = serde_json::to_string(&event.order_tags)?;

        sqlx::query(
            r#"
            INSERT INTO orders_logs (customer_id, order_id, change_type, old_price, new_price,
                                     price_change_percent, order_name, order_tags, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.customer_id)
        .bind(event.order_id)
        .bind(event.kind.as_str())
        .bind(event.old_price.map(price_text))
        .bind(price_text(event.new_price))
        .bind(event.percent.map(i64::from))
        .bind(&event.order_name)
        .bind(tags)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(db_err(ctx))?;

        debug!("写入审计日志: 订单 {} {}", event.order_id, event.kind.as_str());
        Ok(())
    }
}
