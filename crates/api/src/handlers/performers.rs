use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use gigmarket_domain::{AssignmentResult, Order, Pagination, TeamRoster, UserProfile};
use serde::{Deserialize, Serialize};

use super::ensure_id;
use crate::{
    error::ApiResult,
    response::{success, success_with_message},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub performer_id: i64,
}

/// 认领结果：订单字段加上执行方
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    #[serde(flatten)]
    pub order: Order,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performer: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamRoster>,
}

impl From<AssignmentResult> for ClaimResponse {
    fn from(result: AssignmentResult) -> Self {
        let outcome = result.outcome();
        match result {
            AssignmentResult::AssignedSingle { order, performer } => Self {
                order,
                outcome,
                performer: Some(performer),
                team: None,
            },
            AssignmentResult::JoinedTeam { order, team }
            | AssignmentResult::CreatedTeam { order, team } => Self {
                order,
                outcome,
                performer: None,
                team: Some(team),
            },
        }
    }
}

/// 执行者可认领的订单
pub async fn list_eligible_orders(
    State(state): State<AppState>,
    Path(performer_id): Path<i64>,
    Query(page): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let performer_id = ensure_id("performer_id", performer_id)?;
    let orders = state
        .eligibility
        .list_eligible_orders(performer_id, page)
        .await?;
    Ok(success(orders))
}

/// 认领订单，资源争用时按配置重试
pub async fn claim_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<impl IntoResponse> {
    let order_id = ensure_id("order_id", order_id)?;
    let performer_id = ensure_id("performer_id", request.performer_id)?;

    let result = state
        .assignment
        .assign_performer_with_retry(order_id, performer_id, &state.retry)
        .await?;

    let message = match &result {
        AssignmentResult::AssignedSingle { .. } => "订单已指派给您",
        AssignmentResult::JoinedTeam { .. } => "已加入订单团队",
        AssignmentResult::CreatedTeam { .. } => "已为订单创建团队",
    };
    Ok(success_with_message(ClaimResponse::from(result), message))
}

/// 执行者已认领的订单
pub async fn list_assigned_orders(
    State(state): State<AppState>,
    Path(performer_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let performer_id = ensure_id("performer_id", performer_id)?;
    let orders = state.lifecycle.list_assigned_orders(performer_id).await?;
    Ok(success(orders))
}
