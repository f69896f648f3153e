//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigmarket_core::MarketResult;
use rust_decimal::Decimal;

use crate::entities::{
    Customer, NewOrder, Order, OrderUpdate, Performer, PriceEvent, TagSet, Team, UserProfile,
};
use crate::tag_index::TagIndex;

/// 订单仓储抽象
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 创建订单，不存在的标签会被创建
    async fn create(&self, customer_id: i64, new_order: &NewOrder) -> MarketResult<Order>;
    async fn find_by_id(&self, id: i64) -> MarketResult<Option<Order>>;
    /// 未认领、未封禁且标签与 `tags` 有交集的订单，按id排序
    async fn find_eligible(&self, tags: &TagSet) -> MarketResult<Vec<Order>>;
    async fn find_by_customer(&self, customer_id: i64) -> MarketResult<Vec<Order>>;
    /// 指派给该执行者的单人订单，以及其所在团队的团队订单（不含封禁订单）
    async fn find_assigned_to(&self, performer_id: i64) -> MarketResult<Vec<Order>>;
    async fn update(&self, id: i64, update: &OrderUpdate) -> MarketResult<Option<Order>>;
    /// 仅当当前价格等于 `expected` 时写入新价格
    async fn update_price(&self, id: i64, expected: Decimal, new_price: Decimal)
        -> MarketResult<bool>;
    async fn delete(&self, id: i64) -> MarketResult<bool>;
    async fn set_blocked(
        &self,
        id: i64,
        is_blocked: bool,
        blocked_until: Option<DateTime<Utc>>,
    ) -> MarketResult<Option<Order>>;
    /// 清除已过期的封禁，返回受影响的订单数
    async fn unblock_expired(&self, now: DateTime<Utc>) -> MarketResult<u64>;
    /// 锁定订单行并开启认领事务，订单不存在时返回 `None`
    async fn begin_claim(&self, order_id: i64) -> MarketResult<Option<Box<dyn ClaimTransaction>>>;
}

/// 持有订单行独占访问权的认领事务
///
/// 未调用 `commit` 即被丢弃时整体回滚。
#[async_trait]
pub trait ClaimTransaction: Send {
    /// 加锁时读取到的订单
    fn order(&self) -> &Order;

    /// 比较并设置 `performer_id`，已被占用时返回 false
    async fn assign_performer(&mut self, performer_id: i64) -> MarketResult<bool>;

    async fn find_team(&mut self, team_id: i64) -> MarketResult<Option<Team>>;

    /// 为订单创建团队（客户取自订单，负责人为空）并关联到订单
    async fn create_team(&mut self, name: &str) -> MarketResult<Team>;

    /// 加入团队，已是成员时返回 false
    async fn add_team_member(&mut self, team_id: i64, performer_id: i64) -> MarketResult<bool>;

    async fn commit(self: Box<Self>) -> MarketResult<()>;
}

/// 团队仓储抽象
#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> MarketResult<Option<Team>>;
    /// 仅当团队尚无负责人时设置，返回是否生效
    async fn assign_lead(&self, team_id: i64, performer_id: i64) -> MarketResult<bool>;
}

/// 外部用户目录（执行者与客户）
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_performer(&self, id: i64) -> MarketResult<Option<Performer>>;
    async fn find_customer(&self, id: i64) -> MarketResult<Option<Customer>>;
    async fn find_profile(&self, id: i64) -> MarketResult<Option<UserProfile>>;
    /// 按 `ids` 的顺序返回存在的用户资料
    async fn find_profiles(&self, ids: &[i64]) -> MarketResult<Vec<UserProfile>>;
    /// 清除已过期的用户封禁，返回受影响的用户数
    async fn unblock_expired(&self, now: DateTime<Utc>) -> MarketResult<u64>;
}

/// 专长目录，提供专长到标签的映射
#[async_trait]
pub trait SpecialityCatalog: Send + Sync {
    async fn load_index(&self) -> MarketResult<TagIndex>;
}

/// 审计日志的持久化
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert(&self, event: &PriceEvent) -> MarketResult<()>;
}

/// 价格事件记录端口
///
/// 调用方不等待写入完成，也不会收到写入失败。
pub trait OrderAuditLog: Send + Sync {
    fn record(&self, event: PriceEvent);
}
