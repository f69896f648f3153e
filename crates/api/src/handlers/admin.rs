use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::ensure_id;
use crate::{error::ApiResult, response::success, routes::AppState};

/// 封禁请求，未给出截止时间时使用默认封禁天数
#[derive(Debug, Default, Deserialize)]
pub struct BlockRequest {
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

pub async fn block_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(request): Json<BlockRequest>,
) -> ApiResult<impl IntoResponse> {
    let order_id = ensure_id("order_id", order_id)?;
    let order = state.lifecycle.block_order(order_id, request.until).await?;
    Ok(success(order))
}

pub async fn unblock_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let order_id = ensure_id("order_id", order_id)?;
    let order = state.lifecycle.unblock_order(order_id).await?;
    Ok(success(order))
}

/// 手动触发一次自动解封
pub async fn run_unblock_sweep(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = state.lifecycle.auto_unblock_sweep(Utc::now()).await?;
    info!(
        "手动解封完成: 订单 {} 个，用户 {} 个",
        report.orders, report.users
    );
    Ok(success(report))
}
