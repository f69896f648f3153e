//! # 领域服务模块
//!
//! 订单分配与团队组建的业务规则：
//!
//! - [`EligibilityService`]: 计算执行者可见的未认领订单
//! - [`AssignmentService`]: 认领事务，单人指派或加入/创建团队
//! - [`TeamRegistry`]: 团队成员与负责人
//! - [`OrderLifecycleService`]: 订单创建、封禁、自动解封与调价

mod assignment;
mod eligibility;
mod lifecycle;
mod team_registry;

pub use assignment::{AssignmentResult, AssignmentService};
pub use eligibility::EligibilityService;
pub use lifecycle::OrderLifecycleService;
pub use team_registry::TeamRegistry;

use gigmarket_core::{MarketError, MarketResult};

use crate::entities::{Customer, Performer};
use crate::repositories::UserDirectory;

pub(crate) async fn load_active_performer(
    users: &dyn UserDirectory,
    performer_id: i64,
) -> MarketResult<Performer> {
    let performer = users
        .find_performer(performer_id)
        .await?
        .ok_or(MarketError::PerformerNotFound { id: performer_id })?;
    if performer.is_blocked {
        return Err(MarketError::PerformerBlocked { id: performer_id });
    }
    Ok(performer)
}

pub(crate) async fn load_active_customer(
    users: &dyn UserDirectory,
    customer_id: i64,
) -> MarketResult<Customer> {
    let customer = users
        .find_customer(customer_id)
        .await?
        .ok_or(MarketError::CustomerNotFound { id: customer_id })?;
    if customer.is_blocked {
        return Err(MarketError::CustomerBlocked { id: customer_id });
    }
    Ok(customer)
}
