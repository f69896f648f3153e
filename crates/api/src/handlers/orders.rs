use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use gigmarket_core::retry_with_backoff;
use gigmarket_domain::{NewOrder, OrderUpdate, PriceDirection};
use serde::Deserialize;

use super::ensure_id;
use crate::{
    error::ApiResult,
    response::{created, deleted, success, success_with_message},
    routes::AppState,
};

/// 调价请求
#[derive(Debug, Deserialize)]
pub struct PriceAdjustmentRequest {
    pub percent: u32,
    pub direction: PriceDirection,
}

pub async fn create_order(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
    Json(request): Json<NewOrder>,
) -> ApiResult<impl IntoResponse> {
    let customer_id = ensure_id("customer_id", customer_id)?;
    let order = state.lifecycle.create_order(customer_id, request).await?;
    Ok(created(order))
}

pub async fn list_customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let customer_id = ensure_id("customer_id", customer_id)?;
    let orders = state.lifecycle.list_customer_orders(customer_id).await?;
    Ok(success(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let order_id = ensure_id("order_id", order_id)?;
    let order = state.lifecycle.get_order(order_id).await?;
    Ok(success(order))
}

/// 更新订单，请求中出现的字段整体替换
pub async fn update_order(
    State(state): State<AppState>,
    Path((customer_id, order_id)): Path<(i64, i64)>,
    Json(request): Json<OrderUpdate>,
) -> ApiResult<impl IntoResponse> {
    let customer_id = ensure_id("customer_id", customer_id)?;
    let order_id = ensure_id("order_id", order_id)?;
    let order = state
        .lifecycle
        .update_order(order_id, customer_id, request)
        .await?;
    Ok(success(order))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path((customer_id, order_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    let customer_id = ensure_id("customer_id", customer_id)?;
    let order_id = ensure_id("order_id", order_id)?;
    state
        .lifecycle
        .delete_order(order_id, Some(customer_id))
        .await?;
    Ok(deleted(format!("订单 {} 已删除", order_id)))
}

/// 按允许的百分比调价，价格被并发修改时重试
pub async fn adjust_order_price(
    State(state): State<AppState>,
    Path((customer_id, order_id)): Path<(i64, i64)>,
    Json(request): Json<PriceAdjustmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let customer_id = ensure_id("customer_id", customer_id)?;
    let order_id = ensure_id("order_id", order_id)?;

    let order = retry_with_backoff(&state.retry, "订单调价", || {
        state.lifecycle.adjust_price(
            order_id,
            Some(customer_id),
            request.percent,
            request.direction,
        )
    })
    .await?;

    let message = format!("价格已调整为 {}", order.price);
    Ok(success_with_message(order, message))
}
