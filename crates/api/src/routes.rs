use axum::{
    routing::{get, post, put},
    Router,
};
use gigmarket_core::RetryConfig;
use gigmarket_domain::{AssignmentService, EligibilityService, OrderLifecycleService, TeamRegistry};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::handlers::{
    admin::{block_order, run_unblock_sweep, unblock_order},
    health::health_check,
    metrics::render_metrics,
    orders::{
        adjust_order_price, create_order, delete_order, get_order, list_customer_orders,
        update_order,
    },
    performers::{claim_order, list_assigned_orders, list_eligible_orders},
    teams::{assign_team_lead, get_team},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub eligibility: Arc<EligibilityService>,
    pub assignment: Arc<AssignmentService>,
    pub teams: Arc<TeamRegistry>,
    pub lifecycle: Arc<OrderLifecycleService>,
    /// 认领和调价遇到资源争用时的重试策略
    pub retry: RetryConfig,
    pub metrics: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查与指标
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        // 执行者
        .route(
            "/api/performers/{performer_id}/eligible-orders",
            get(list_eligible_orders),
        )
        .route("/api/performers/{performer_id}/orders", get(list_assigned_orders))
        .route("/api/orders/{order_id}/claim", post(claim_order))
        .route("/api/orders/{order_id}", get(get_order))
        // 客户
        .route(
            "/api/customers/{customer_id}/orders",
            get(list_customer_orders).post(create_order),
        )
        .route(
            "/api/customers/{customer_id}/orders/{order_id}",
            put(update_order).delete(delete_order),
        )
        .route(
            "/api/customers/{customer_id}/orders/{order_id}/price",
            post(adjust_order_price),
        )
        // 团队
        .route("/api/teams/{team_id}", get(get_team))
        .route(
            "/api/customers/{customer_id}/teams/{team_id}/lead",
            put(assign_team_lead),
        )
        // 管理
        .route(
            "/api/admin/orders/{order_id}/block",
            put(block_order).delete(unblock_order),
        )
        .route("/api/admin/maintenance/unblock-sweep", post(run_unblock_sweep))
        .with_state(state)
}
