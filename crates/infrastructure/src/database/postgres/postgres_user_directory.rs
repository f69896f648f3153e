use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigmarket_core::MarketResult;
use gigmarket_domain::{
    Customer, Performer, SpecialityCatalog, TagIndex, UserDirectory, UserProfile,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::error_handling::{db_err, OperationContext, RepositoryErrorHelpers, RepositoryOperation};
use crate::repo_context;

const ENTITY: &str = "用户";
const PROFILE_COLUMNS: &str = "id, username, first_name, last_name, photo_link";

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_profile(row: &PgRow, ctx: &OperationContext) -> MarketResult<UserProfile> {
        let map = |e: sqlx::Error| RepositoryErrorHelpers::database_error(ctx.clone(), e);
        Ok(UserProfile {
            id: row.try_get("id").map_err(map)?,
            username: row.try_get("username").map_err(map)?,
            first_name: row.try_get("first_name").map_err(map)?,
            last_name: row.try_get("last_name").map_err(map)?,
            photo_link: row.try_get("photo_link").map_err(map)?,
        })
    }

    async fn blocked_flag(&self, id: i64, ctx: &OperationContext) -> MarketResult<Option<bool>> {
        sqlx::query_scalar("SELECT is_blocked FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err(ctx.clone()))
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[instrument(skip(self), fields(performer_id = %id))]
    async fn find_performer(&self, id: i64) -> MarketResult<Option<Performer>> {
        let ctx = repo_context!(RepositoryOperation::Read, ENTITY, id);
        let Some(is_blocked) = self.blocked_flag(id, &ctx).await? else {
            return Ok(None);
        };

        let specialities: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT s.name FROM users_specialities us
            JOIN specialities s ON s.id = us.speciality_id
            WHERE us.user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err(ctx))?;

        Ok(Some(Performer {
            id,
            is_blocked,
            specialities: specialities.into_iter().collect::<BTreeSet<_>>(),
        }))
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn find_customer(&self, id: i64) -> MarketResult<Option<Customer>> {
        let ctx = repo_context!(RepositoryOperation::Read, ENTITY, id);
        Ok(self
            .blocked_flag(id, &ctx)
            .await?
            .map(|is_blocked| Customer { id, is_blocked }))
    }

    async fn find_profile(&self, id: i64) -> MarketResult<Option<UserProfile>> {
        let ctx = repo_context!(RepositoryOperation::Read, ENTITY, id);
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err(ctx.clone()))?;
        row.map(|row| Self::row_to_profile(&row, &ctx)).transpose()
    }

    async fn find_profiles(&self, ids: &[i64]) -> MarketResult<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ctx = repo_context!(RepositoryOperation::Query, ENTITY);
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = ANY($1)");
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err(ctx.clone()))?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in &rows {
            let profile = Self::row_to_profile(row, &ctx)?;
            by_id.insert(profile.id, profile);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    #[instrument(skip(self))]
    async fn unblock_expired(&self, now: DateTime<Utc>) -> MarketResult<u64> {
        let ctx = repo_context!(RepositoryOperation::Sweep, ENTITY);
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_blocked = FALSE, block_expired = NULL
            WHERE is_blocked = TRUE AND block_expired IS NOT NULL AND block_expired < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err(ctx))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SpecialityCatalog for PostgresUserDirectory {
    async fn load_index(&self) -> MarketResult<TagIndex> {
        let ctx = repo_context!(RepositoryOperation::Query, "专长标签");
        let pairs: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT s.name, t.name FROM specialities_tags st
            JOIN specialities s ON s.id = st.speciality_id
            JOIN tags t ON t.id = st.tag_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err(ctx))?;

        debug!("加载专长标签映射 {} 条", pairs.len());
        Ok(TagIndex::from_pairs(pairs))
    }
}
