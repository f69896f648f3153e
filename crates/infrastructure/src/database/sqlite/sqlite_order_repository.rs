use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigmarket_core::{MarketError, MarketResult};
use gigmarket_domain::{
    ClaimTransaction, NewOrder, Order, OrderRepository, OrderUpdate, TagSet, Team,
};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use super::rows::{
    fetch_order, fetch_team, hydrate_orders, price_text, replace_images, replace_tags,
    ORDER_COLUMNS,
};
use crate::error_handling::{db_err, RepositoryOperation};
use crate::repo_context;

const ENTITY: &str = "订单";

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    #[instrument(skip(self, new_order), fields(customer_id = %customer_id, name = %new_order.name))]
    async fn create(&self, customer_id: i64, new_order: &NewOrder) -> MarketResult<Order> {
        let ctx = repo_context!(RepositoryOperation::Create, ENTITY);
        let mut tx = self.pool.begin().await.map_err(db_err(ctx.clone()))?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO orders (name, description, customer_id, execution_type, price,
                                is_blocked, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&new_order.name)
        .bind(&new_order.description)
        .bind(customer_id)
        .bind(new_order.execution_type.as_str())
        .bind(price_text(new_order.price))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err(ctx.clone()))?;
        let order_id = result.last_insert_rowid();

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

        let placeholders = vec!["?"; tags.len()].join(", ");
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE is_blocked = 0
              AND blocked_until IS NULL
              AND performer_id IS NULL
              AND performer_team_id IS NULL
              AND id IN (
                  SELECT ot.order_id FROM orders_tags ot
                  JOIN tags t ON t.id = ot.tag_id
                  WHERE t.name IN ({placeholders})
              )
            ORDER BY id
            "#
        );
        let mut query = sqlx::query(&sql);
        for tag in tags {
            query = query.bind(tag);
        }

        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;
        let rows = query
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
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ? ORDER BY id");

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
            WHERE is_blocked = 0
              AND blocked_until IS NULL
              AND (performer_id = ?
                   OR performer_team_id IN (SELECT team_id FROM teams_users WHERE user_id = ?))
            ORDER BY id
            "#
        );

        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;
        let rows = sqlx::query(&sql)
            .bind(performer_id)
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
            SET name = COALESCE(?, name),
                description = COALESCE(?, description),
                price = COALESCE(?, price),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.price.map(price_text))
        .bind(Utc::now())
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
        let result =
            sqlx::query("UPDATE orders SET price = ?, updated_at = ? WHERE id = ? AND price = ?")
                .bind(price_text(new_price))
                .bind(Utc::now())
                .bind(id)
                .bind(price_text(expected))
                .execute(&self.pool)
                .await
                .map_err(db_err(ctx))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn delete(&self, id: i64) -> MarketResult<bool> {
        let ctx = repo_context!(RepositoryOperation::Delete, ENTITY, id);
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
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
            "UPDATE orders SET is_blocked = ?, blocked_until = ?, updated_at = ? WHERE id = ?",
        )
        .bind(is_blocked)
        .bind(blocked_until)
        .bind(Utc::now())
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
            SET is_blocked = 0, blocked_until = NULL, updated_at = ?
            WHERE is_blocked = 1 AND blocked_until IS NOT NULL AND blocked_until < ?
            "#,
        )
        .bind(Utc::now())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err(ctx))?;
        Ok(result.rows_affected())
    }

    /// 先执行一次空更新拿到写锁，等待超过 busy_timeout 时返回 SQLITE_BUSY
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn begin_claim(&self, order_id: i64) -> MarketResult<Option<Box<dyn ClaimTransaction>>> {
        let ctx = repo_context!(RepositoryOperation::Claim, ENTITY, order_id);
        let mut tx = self.pool.begin().await.map_err(db_err(ctx.clone()))?;

        let locked = sqlx::query("UPDATE orders SET updated_at = updated_at WHERE id = ?")
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err(ctx.clone()))?;
        if locked.rows_affected() == 0 {
            return Ok(None);
        }

        let order = fetch_order(&mut tx, order_id, &ctx)
            .await?
            .ok_or(MarketError::OrderNotFound { id: order_id })?;
        debug!("已锁定订单: {}", order.entity_description());
        Ok(Some(Box::new(SqliteClaimTransaction { tx, order })))
    }
}

pub struct SqliteClaimTransaction {
    tx: Transaction<'static, Sqlite>,
    order: Order,
}

#[async_trait]
impl ClaimTransaction for SqliteClaimTransaction {
    fn order(&self) -> &Order {
        &self.order
    }

    async fn assign_performer(&mut self, performer_id: i64) -> MarketResult<bool> {
        let ctx = repo_context!(RepositoryOperation::Claim, ENTITY, self.order.id);
        let result = sqlx::query(
            "UPDATE orders SET performer_id = ?, updated_at = ? WHERE id = ? AND performer_id IS NULL",
        )
        .bind(performer_id)
        .bind(Utc::now())
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
        let team_id = sqlx::query("INSERT INTO teams (name, customer_id, lead_id) VALUES (?, ?, NULL)")
            .bind(name)
            .bind(self.order.customer_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err(ctx.clone()))?
            .last_insert_rowid();

        let linked = sqlx::query(
            "UPDATE orders SET performer_team_id = ?, updated_at = ? WHERE id = ? AND performer_team_id IS NULL",
        )
        .bind(team_id)
        .bind(Utc::now())
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
            r#"
            INSERT INTO teams_users (team_id, user_id, joined_at)
            VALUES (?, ?, (SELECT COALESCE(MAX(joined_at), 0) + 1 FROM teams_users WHERE team_id = ?))
            ON CONFLICT (team_id, user_id) DO NOTHING
            "#,
        )
        .bind(team_id)
        .bind(performer_id)
        .bind(team_id)
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
