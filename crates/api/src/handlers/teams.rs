use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::ensure_id;
use crate::{error::ApiResult, response::success, routes::AppState};

#[derive(Debug, Deserialize)]
pub struct TeamLeadRequest {
    pub performer_id: i64,
}

pub async fn get_team(
    State(state): State<AppState>,
    Path(team_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let team_id = ensure_id("team_id", team_id)?;
    let roster = state.teams.get_team_with_members(team_id).await?;
    Ok(success(roster))
}

/// 客户从团队成员中指定负责人，团队随即关闭
pub async fn assign_team_lead(
    State(state): State<AppState>,
    Path((customer_id, team_id)): Path<(i64, i64)>,
    Json(request): Json<TeamLeadRequest>,
) -> ApiResult<impl IntoResponse> {
    let customer_id = ensure_id("customer_id", customer_id)?;
    let team_id = ensure_id("team_id", team_id)?;
    let performer_id = ensure_id("performer_id", request.performer_id)?;
    let roster = state
        .teams
        .assign_team_lead(team_id, customer_id, performer_id)
        .await?;
    Ok(success(roster))
}
