use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigmarket_core::{MarketError, MarketResult};
use gigmarket_domain::{
    ClaimTransaction, NewOrder, Order, OrderRepository, OrderUpdate, TagSet, Team,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use super::rows::{
    fetch_order, fetch_team, hydrate_orders, replace_images, replace_tags, ORDER_COLUMNS,
};
use crate::error_handling::{db_err, RepositoryOperation};
use crate::repo_context;

const ENTITY: &str = "订单";

pub struct PostgresOrderRepository {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[instrument(skip(self, new_order), fields(customer_id = %customer_id, name = %new_order.name))]
    async fn create(&self, customer_id: i64, new_order: &NewOrder) -> MarketResult<Order> {
        let ctx = repo_context!(RepositoryOperation::Create, ENTITY);
        let mut tx = self.pool.begin().await.map_err(db_err(ctx.clone()))?;

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (name, description, customer_id, execution_type, price, is_blocked)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            RETURNING id
            "#,
        )
        .bind(&new_order.name)
        .bind(new_order.description.as_deref())
        .bind(customer_id)
        .bind(new_order.execution_type.as_str())
        .bind(new_order.price)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err(ctx.clone()))?;

        replace_tags(&mut tx, order_id, &new_order.tags, &ctx).await?;
        replace_images(&mut tx, order_id, &new_order.images, &ctx).await?;
        let order = fetch_order(&mut tx, order_id, &ctx)
            .await?
            .ok_or_else(|| MarketError::internal(format!("新建订单 {order_id} 读取失败")))?;

        tx.commit().await.map_err(db_err(ctx))?;
        debug!("创建订单成功: {}", order.entity_description());
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn find_by_id(&self, id: i64) -> MarketResult<Option<Order>> {
        let ctx = repo_context!(RepositoryOperation::Read, ENTITY, id);
        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;
        fetch_order(&mut conn, id, &ctx).await
    }

    #[instrument(skip(self, tags), fields(tag_count = tags.len()))]
    async fn find_eligible(&self, tags: &TagSet) -> MarketResult<Vec<Order>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let ctx = repo_context!(RepositoryOperation::Query, ENTITY);
        let tags: Vec<String> = tags.iter().cloned().collect();
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE is_blocked = FALSE
              AND blocked_until IS NULL
              AND performer_id IS NULL
              AND performer_team_id IS NULL
              AND id IN (
                  SELECT ot.order_id FROM orders_tags ot
                  JOIN tags t ON t.id = ot.tag_id
                  WHERE t.name = ANY($1)
              )
            ORDER BY id
            "#
        );

        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;
        let rows = sqlx::query(&sql)
            .bind(&tags)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err(ctx.clone()))?;
        let orders = hydrate_orders(&mut conn, rows, &ctx).await?;
        debug!("查询到 {} 个可认领订单", orders.len());
        Ok(orders)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn find_by_customer(&self, customer_id: i64) -> MarketResult<Vec<Order>> {
        let ctx = repo_context!(RepositoryOperation::Query, ENTITY);
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY id");

        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;
        let rows = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err(ctx.clone()))?;
        hydrate_orders(&mut conn, rows, &ctx).await
    }

    #[instrument(skip(self), fields(performer_id = %performer_id))]
    async fn find_assigned_to(&self, performer_id: i64) -> MarketResult<Vec<Order>> {
        let ctx = repo_context!(RepositoryOperation::Query, ENTITY);
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE is_blocked = FALSE
              AND blocked_until IS NULL
              AND (performer_id = $1
                   OR performer_team_id IN (SELECT team_id FROM teams_users WHERE user_id = $1))
            ORDER BY id
            "#
        );

        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;
        let rows = sqlx::query(&sql)
            .bind(performer_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err(ctx.clone()))?;
        hydrate_orders(&mut conn, rows, &ctx).await
    }

    #[instrument(skip(self, update), fields(order_id = %id))]
    async fn update(&self, id: i64, update: &OrderUpdate) -> MarketResult<Option<Order>> {
        let ctx = repo_context!(RepositoryOperation::Update, ENTITY, id);
        let mut tx = self.pool.begin().await.map_err(db_err(ctx.clone()))?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.price)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err(ctx.clone()))?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(tags) = &update.tags {
            replace_tags(&mut tx, id, tags, &ctx).await?;
        }
        if let Some(images) = &update.images {
            replace_images(&mut tx, id, images, &ctx).await?;
        }
        let order = fetch_order(&mut tx, id, &ctx).await?;
        tx.commit().await.map_err(db_err(ctx))?;
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %id, expected = %expected, new_price = %new_price))]
    async fn update_price(
        &self,
        id: i64,
        expected: Decimal,
        new_price: Decimal,
    ) -> MarketResult<bool> {
        let ctx = repo_context!(RepositoryOperation::Update, ENTITY, id);
        let result = sqlx::query(
            "UPDATE orders SET price = $1, updated_at = NOW() WHERE id = $2 AND price = $3",
        )
        .bind(new_price)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(db_err(ctx))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn delete(&self, id: i64) -> MarketResult<bool> {
        let ctx = repo_context!(RepositoryOperation::Delete, ENTITY, id);
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err(ctx))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(order_id = %id, is_blocked = %is_blocked))]
    async fn set_blocked(
        &self,
        id: i64,
        is_blocked: bool,
        blocked_until: Option<DateTime<Utc>>,
    ) -> MarketResult<Option<Order>> {
        let ctx = repo_context!(RepositoryOperation::Update, ENTITY, id);
        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;

        let result = sqlx::query(
            "UPDATE orders SET is_blocked = $1, blocked_until = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(is_blocked)
        .bind(blocked_until)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_order(&mut conn, id, &ctx).await
    }

    #[instrument(skip(self))]
    async fn unblock_expired(&self, now: DateTime<Utc>) -> MarketResult<u64> {
        let ctx = repo_context!(RepositoryOperation::Sweep, ENTITY);
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET is_blocked = FALSE, blocked_until = NULL, updated_at = NOW()
            WHERE is_blocked = TRUE AND blocked_until IS NOT NULL AND blocked_until < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err(ctx))?;
        Ok(result.rows_affected())
    }

    /// `SELECT ... FOR UPDATE`，等待超过 lock_timeout 时返回 55P03
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn begin_claim(&self, order_id: i64) -> MarketResult<Option<Box<dyn ClaimTransaction>>> {
        let ctx = repo_context!(RepositoryOperation::Claim, ENTITY, order_id);
        let mut tx = self.pool.begin().await.map_err(db_err(ctx.clone()))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(db_err(ctx.clone()))?;

        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err(ctx.clone()))?;
        if locked.is_none() {
            return Ok(None);
        }

        let order = fetch_order(&mut tx, order_id, &ctx)
            .await?
            .ok_or(MarketError::OrderNotFound { id: order_id })?;
        debug!("已锁定订单: {}", order.entity_description());
        Ok(Some(Box::new(PostgresClaimTransaction { tx, order })))
    }
}

pub struct PostgresClaimTransaction {
    tx: Transaction<'static, Postgres>,
    order: Order,
}

#[async_trait]
impl ClaimTransaction for PostgresClaimTransaction {
    fn order(&self) -> &Order {
        &self.order
    }

    async fn assign_performer(&mut self, performer_id: i64) -> MarketResult<bool> {
        let ctx = repo_context!(RepositoryOperation::Claim, ENTITY, self.order.id);
        let result = sqlx::query(
            "UPDATE orders SET performer_id = $1, updated_at = NOW() WHERE id = $2 AND performer_id IS NULL",
        )
        .bind(performer_id)
        .bind(self.order.id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err(ctx))?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_team(&mut self, team_id: i64) -> MarketResult<Option<Team>> {
        let ctx = repo_context!(RepositoryOperation::Read, "团队", team_id);
        fetch_team(&mut self.tx, team_id, &ctx).await
    }

    async fn create_team(&mut self, name: &str) -> MarketResult<Team> {
        let ctx = repo_context!(RepositoryOperation::Create, "团队");
        let team_id: i64 = sqlx::query_scalar(
            "INSERT INTO teams (name, customer_id, lead_id) VALUES ($1, $2, NULL) RETURNING id",
        )
        .bind(name)
        .bind(self.order.customer_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err(ctx.clone()))?;

        let linked = sqlx::query(
            "UPDATE orders SET performer_team_id = $1, updated_at = NOW() WHERE id = $2 AND performer_team_id IS NULL",
        )
        .bind(team_id)
        .bind(self.order.id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err(ctx))?;
        if linked.rows_affected() == 0 {
            return Err(MarketError::internal(format!(
                "订单 {} 已关联团队",
                self.order.id
            )));
        }

        self.order.performer_team_id = Some(team_id);
        Ok(Team {
            id: team_id,
            name: name.to_string(),
            customer_id: self.order.customer_id,
            lead_id: None,
            members: Vec::new(),
        })
    }

    async fn add_team_member(&mut self, team_id: i64, performer_id: i64) -> MarketResult<bool> {
        let ctx = repo_context!(RepositoryOperation::Update, "团队", team_id);
        let result = sqlx::query(
            "INSERT INTO teams_users (team_id, user_id) VALUES ($1, $2) ON CONFLICT (team_id, user_id) DO NOTHING",
        )
        .bind(team_id)
        .bind(performer_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err(ctx))?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> MarketResult<()> {
        let ctx = repo_context!(RepositoryOperation::Claim, ENTITY, self.order.id);
        self.tx.commit().await.map_err(db_err(ctx))
    }
}
