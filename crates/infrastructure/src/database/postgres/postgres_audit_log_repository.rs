use async_trait::async_trait;
use gigmarket_core::MarketResult;
use gigmarket_domain::{AuditLogRepository, PriceEvent};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::error_handling::{db_err, RepositoryOperation};
use crate::repo_context;

pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    #[instrument(skip(self, event), fields(order_id = %event.order_id, kind = event.kind.as_str()))]
    async fn insert(&self, event: &PriceEvent) -> MarketResult<()> {
        let ctx = repo_context!(RepositoryOperation::Create, "审计日志", event.order_id);
        let tags = serde_json::to_string(&event.order_tags)?;

        sqlx::query(
            r#"
            INSERT INTO orders_logs (customer_id, order_id, change_type, old_price, new_price,
                                     price_change_percent, order_name, order_tags, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::jsonb, $9)
            "#,
        )
        .bind(event.customer_id)
        .bind(event.order_id)
        .bind(event.kind.as_str())
        .bind(event.old_price)
        .bind(event.new_price)
        .bind(event.percent.map(|p| p as i32))
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
