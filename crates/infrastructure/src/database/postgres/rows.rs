//! PostgreSQL 行映射与订单明细的读写

use std::str::FromStr;

use gigmarket_core::MarketResult;
use gigmarket_domain::{ExecutionType, Order, TagSet, Team};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::error_handling::{db_err, OperationContext, RepositoryErrorHelpers};

pub(crate) const ORDER_COLUMNS: &str = "id, name, description, customer_id, execution_type, \
     performer_id, performer_team_id, price, is_blocked, blocked_until, created_at, updated_at";

pub(crate) fn row_to_order(row: &PgRow, ctx: &OperationContext) -> MarketResult<Order> {
    let map = |e: sqlx::Error| RepositoryErrorHelpers::database_error(ctx.clone(), e);

    let execution_type: String = row.try_get("execution_type").map_err(map)?;
    let execution_type = ExecutionType::from_str(&execution_type)
        .map_err(|e| RepositoryErrorHelpers::corrupted_data(ctx, e))?;

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
        price: row.try_get("price").map_err(map)?,
        is_blocked: row.try_get("is_blocked").map_err(map)?,
        blocked_until: row.try_get("blocked_until").map_err(map)?,
        created_at: row.try_get("created_at").map_err(map)?,
        updated_at: row.try_get("updated_at").map_err(map)?,
    })
}

pub(crate) async fn attach_details(
    conn: &mut PgConnection,
    order: &mut Order,
    ctx: &OperationContext,
) -> MarketResult<()> {
    let tags: Vec<String> = sqlx::query_scalar(
        "SELECT t.name FROM orders_tags ot JOIN tags t ON t.id = ot.tag_id WHERE ot.order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err(ctx.clone()))?;

    let images: Vec<String> = sqlx::query_scalar(
        "SELECT image_link FROM orders_images WHERE order_id = $1 ORDER BY is_main DESC, id",
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
    conn: &mut PgConnection,
    id: i64,
    ctx: &OperationContext,
) -> MarketResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
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
    conn: &mut PgConnection,
    rows: Vec<PgRow>,
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

pub(crate) async fn replace_tags(
    conn: &mut PgConnection,
    order_id: i64,
    tags: &[String],
    ctx: &OperationContext,
) -> MarketResult<()> {
    sqlx::query("DELETE FROM orders_tags WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;

    let unique: Vec<String> = tags.iter().cloned().collect::<TagSet>().into_iter().collect();
    if unique.is_empty() {
        return Ok(());
    }

    sqlx::query("INSERT INTO tags (name) SELECT UNNEST($1::TEXT[]) ON CONFLICT (name) DO NOTHING")
        .bind(&unique)
        .execute(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;
    sqlx::query(
        "INSERT INTO orders_tags (order_id, tag_id) SELECT $1, id FROM tags WHERE name = ANY($2)",
    )
    .bind(order_id)
    .bind(&unique)
    .execute(&mut *conn)
    .await
    .map_err(db_err(ctx.clone()))?;
    Ok(())
}

pub(crate) async fn replace_images(
    conn: &mut PgConnection,
    order_id: i64,
    images: &[String],
    ctx: &OperationContext,
) -> MarketResult<()> {
    sqlx::query("DELETE FROM orders_images WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;

    for (index, link) in images.iter().enumerate() {
        sqlx::query(
            "INSERT INTO orders_images (order_id, image_link, is_main) VALUES ($1, $2, $3)",
        )
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
    conn: &mut PgConnection,
    team_id: i64,
    ctx: &OperationContext,
) -> MarketResult<Option<Team>> {
    let row = sqlx::query("SELECT id, name, customer_id, lead_id FROM teams WHERE id = $1")
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err(ctx.clone()))?;
    let Some(row) = row else {
        return Ok(None);
    };

    let members: Vec<i64> =
        sqlx::query_scalar("SELECT user_id FROM teams_users WHERE team_id = $1 ORDER BY joined_at")
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
