use async_trait::async_trait;
use gigmarket_core::MarketResult;
use gigmarket_domain::{Team, TeamRepository};
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::rows::fetch_team;
use crate::error_handling::{db_err, RepositoryOperation};
use crate::repo_context;

const ENTITY: &str = "团队";

pub struct PostgresTeamRepository {
    pool: PgPool,
}

impl PostgresTeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamRepository for PostgresTeamRepository {
    #[instrument(skip(self), fields(team_id = %id))]
    async fn find_by_id(&self, id: i64) -> MarketResult<Option<Team>> {
        let ctx = repo_context!(RepositoryOperation::Read, ENTITY, id);
        let mut conn = self.pool.acquire().await.map_err(db_err(ctx.clone()))?;
        fetch_team(&mut conn, id, &ctx).await
    }

    #[instrument(skip(self), fields(team_id = %team_id, performer_id = %performer_id))]
    async fn assign_lead(&self, team_id: i64, performer_id: i64) -> MarketResult<bool> {
        let ctx = repo_context!(RepositoryOperation::Update, ENTITY, team_id);
        let result = sqlx::query("UPDATE teams SET lead_id = $1 WHERE id = $2 AND lead_id IS NULL")
            .bind(performer_id)
            .bind(team_id)
            .execute(&self.pool)
            .await
            .map_err(db_err(ctx))?;

        let applied = result.rows_affected() == 1;
        debug!("设置团队 {} 负责人 {}: {}", team_id, performer_id, applied);
        Ok(applied)
    }
}
