//! # Gigmarket API
//!
//! 零工市场的REST API服务模块，基于Axum框架构建。
//!
//! ## API 端点
//!
//! ### 执行者
//! - `GET /api/performers/{performer_id}/eligible-orders` - 可认领的订单
//! - `GET /api/performers/{performer_id}/orders` - 已认领的订单
//! - `POST /api/orders/{order_id}/claim` - 认领订单（单人指派、加入或创建团队）
//!
//! ### 客户
//! - `POST /api/customers/{customer_id}/orders` - 创建订单
//! - `GET /api/customers/{customer_id}/orders` - 客户的订单
//! - `PUT /api/customers/{customer_id}/orders/{order_id}` - 更新订单
//! - `DELETE /api/customers/{customer_id}/orders/{order_id}` - 删除订单
//! - `POST /api/customers/{customer_id}/orders/{order_id}/price` - 按百分比调价
//! - `PUT /api/customers/{customer_id}/teams/{team_id}/lead` - 指定团队负责人
//!
//! ### 查询
//! - `GET /api/orders/{order_id}` - 订单详情
//! - `GET /api/teams/{team_id}` - 团队及成员
//!
//! ### 管理
//! - `PUT /api/admin/orders/{order_id}/block` - 封禁订单
//! - `DELETE /api/admin/orders/{order_id}/block` - 解除封禁
//! - `POST /api/admin/maintenance/unblock-sweep` - 立即执行自动解封
//!
//! ### 系统
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus 指标
//!
//! 成功响应统一使用 [`response::ApiResponse`] 包装，错误响应格式见 [`error::ApiError`]。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use gigmarket_core::ApiConfig;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, timeout_layer, trace_layer};
pub use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(state: AppState, api_config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(timeout_layer(api_config.request_timeout_seconds))
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
