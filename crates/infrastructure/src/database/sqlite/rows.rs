//! SQLite 行映射与订单明细（标签、图片、团队成员）的读写

use std::str::FromStr;

use gigmarket_core::MarketResult;
use gigmarket_domain::{ExecutionType, Order, TagSet, Team};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::error_handling::{db_err, OperationContext, RepositoryErrorHelpers};

pub(crate) const ORDER_COLUMNS: &str = "id, name, description, customer_id, execution_type, \
     performer_id, performer_team_id, price, is_blocked, blocked_until, created_at, updated_at";

/// 价格以两位小数文本保存，比较并交换时按文本比较
pub(crate) fn price_text(price: Decimal) -> String {
    format!("{:.2}", price)
}

pub(crate) fn row_to_order(row: &SqliteRow, ctx: &OperationContext) -> MarketResult<Order> {
    let map = |e: sqlx::Error| RepositoryErrorHelpers::database_error(ctx.clone(), e);

    let execution_type: String = row.try_get("execution_type").map_err(map)?;
    let execution_type = ExecutionType::from_str(&execution_type)
        .map_err(|e| RepositoryErrorHelpers::corrupted_data(ctx, e))?;
    let price: String = row.try_get("price").map_err(map)?;
    let price =
        Decimal::from_str(&price).map_err(|e| RepositoryErrorHelpers::corrupted_data(ctx, e))?;

    Ok(Order {
        id: row.try_get("id").map_err(map)?,
        name: row.try_get("name").map_err(map)?,
        description: row.try_get("description").map_err(map)?,
        customer_id: row.try_get("customer_id").map_err(map)?,
        execution_type,
        performer_id: row.try_get("performer_id").map_err(map)?,
        performer_team_id: row.try_get("performer_team_id").map_err(map)?,
        tags: TagSet::new(),
        images: Vec::new(),
        price,
        is_blocked: row.try_get("is_blocked").map_err(map)?,
        blocked_until: row.try_get("blocked_until").map_err(map)?,
        created_at: row.try_get("created_at").map_err(map)?,
        updated_at: row.try_get("updated_at").map_err(map)?,
    })
}

/// 补全订单的标签和图片，主图排在第一位
pub(crate) async fn attach_details(
    conn: &mut SqliteConnection,
    order: &mut Order,
    ctx: &OperationContext,
) -> MarketResult<()> {
    let tags: Vec<String> = sqlx::query_scalar(
        "SELECT t.name FROM orders_tags ot JOIN tags t ON t.id = ot.tag_id WHERE ot.order_id = ?",
    )
    .bind(order.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err(ctx.clone()))?;

    let images: Vec<String> = sqlx::query_scalar(
        "SELECT image_link FROM orders_images WHERE order_id = ? ORDER BY is_main DESC, id",
    )
    .bind(order.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err(ctx.clone()))?;

    order.tags = tags.into_iter().collect();
    order.images = images;
    Ok(())
}

pub(crate) async fn fetch_order(
    conn: &mut SqliteConnection,
    id: i64,
    ctx: &OperationContext,
) -> MarketResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;

    match row {
        Some(row) => {
            let mut order = row_to_order(&row, ctx)?;
            attach_details(conn, &mut order, ctx).await?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

pub(crate) async fn hydrate_orders(
    conn: &mut SqliteConnection,
    rows: Vec<SqliteRow>,
    ctx: &OperationContext,
) -> MarketResult<Vec<Order>> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut order = row_to_order(row, ctx)?;
        attach_details(conn, &mut order, ctx).await?;
        orders.push(order);
    }
    Ok(orders)
}

/// 整体替换订单标签，不存在的标签会被创建
pub(crate) async fn replace_tags(
    conn: &mut SqliteConnection,
    order_id: i64,
    tags: &[String],
    ctx: &OperationContext,
) -> MarketResult<()> {
    sqlx::query("DELETE FROM orders_tags WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;

    let unique: TagSet = tags.iter().cloned().collect();
    for tag in &unique {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(tag)
            .execute(&mut *conn)
            .await
            .map_err(db_err(ctx.clone()))?;
        sqlx::query("INSERT INTO orders_tags (order_id, tag_id) SELECT ?, id FROM tags WHERE name = ?")
            .bind(order_id)
            .bind(tag)
            .execute(&mut *conn)
            .await
            .map_err(db_err(ctx.clone()))?;
    }
    Ok(())
}

pub(crate) async fn replace_images(
    conn: &mut SqliteConnection,
    order_id: i64,
    images: &[String],
    ctx: &OperationContext,
) -> MarketResult<()> {
    sqlx::query("DELETE FROM orders_images WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;

    for (index, link) in images.iter().enumerate() {
        sqlx::query("INSERT INTO orders_images (order_id, image_link, is_main) VALUES (?, ?, ?)")
            .bind(order_id)
            .bind(link)
            .bind(index == 0)
            .execute(&mut *conn)
            .await
            .map_err(db_err(ctx.clone()))?;
    }
    Ok(())
}

pub(crate) async fn fetch_team(
    conn: &mut SqliteConnection,
    team_id: i64,
    ctx: &OperationContext,
) -> MarketResult<Option<Team>> {
    let row = sqlx::query("SELECT id, name, customer_id, lead_id FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;
    let Some(row) = row else {
        return Ok(None);
    };

    let members: Vec<i64> =
        sqlx::query_scalar("SELECT user_id FROM teams_users WHERE team_id = ? ORDER BY joined_at")
            .bind(team_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err(ctx.clone()))?;

    let map = |e: sqlx::Error| RepositoryErrorHelpers::database_error(ctx.clone(), e);
    Ok(Some(Team {
        id: row.try_get("id").map_err(map)?,
        name: row.try_get("name").map_err(map)?,
        customer_id: row.try_get("customer_id").map_err(map)?,
        lead_id: row.try_get("lead_id").map_err(map)?,
        members,
    }))
}
