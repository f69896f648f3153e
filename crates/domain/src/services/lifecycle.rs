use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use gigmarket_core::{MarketError, MarketResult};
use metrics::counter;
use tracing::{debug, info, instrument};

use crate::entities::{NewOrder, Order, OrderUpdate, PriceEvent, SweepReport};
use crate::pricing::{self, PriceDirection};
use crate::repositories::{OrderAuditLog, OrderRepository, UserDirectory};

use super::{load_active_customer, load_active_performer};

/// 订单生命周期：创建、更新、封禁、自动解封与调价
pub struct OrderLifecycleService {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserDirectory>,
    audit: Arc<dyn OrderAuditLog>,
    default_block_days: i64,
}

impl OrderLifecycleService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserDirectory>,
        audit: Arc<dyn OrderAuditLog>,
        default_block_days: i64,
    ) -> Self {
        Self {
            orders,
            users,
            audit,
            default_block_days,
        }
    }

    async fn load_order(&self, order_id: i64) -> MarketResult<Order> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(MarketError::OrderNotFound { id: order_id })
    }

    fn ensure_owner(order: &Order, customer_id: i64) -> MarketResult<()> {
        if order.customer_id != customer_id {
            return Err(MarketError::NotOrderOwner {
                order_id: order.id,
                customer_id,
            });
        }
        Ok(())
    }

    #[instrument(skip(self, new_order), fields(customer_id = %customer_id, name = %new_order.name))]
    pub async fn create_order(&self, customer_id: i64, new_order: NewOrder) -> MarketResult<Order> {
        load_active_customer(self.users.as_ref(), customer_id).await?;
        new_order.validate()?;

        let new_order = NewOrder {
            price: pricing::normalize_price(new_order.price),
            ..new_order
        };
        let order = self.orders.create(customer_id, &new_order).await?;
        info!("创建订单成功: {}", order.entity_description());

        self.audit.record(PriceEvent::created(&order));
        Ok(order)
    }

    pub async fn get_order(&self, order_id: i64) -> MarketResult<Order> {
        self.load_order(order_id).await
    }

    pub async fn list_customer_orders(&self, customer_id: i64) -> MarketResult<Vec<Order>> {
        self.users
            .find_customer(customer_id)
            .await?
            .ok_or(MarketError::CustomerNotFound { id: customer_id })?;
        self.orders.find_by_customer(customer_id).await
    }

    /// 执行者已认领的订单，封禁中的订单不返回
    pub async fn list_assigned_orders(&self, performer_id: i64) -> MarketResult<Vec<Order>> {
        load_active_performer(self.users.as_ref(), performer_id).await?;
        self.orders.find_assigned_to(performer_id).await
    }

    #[instrument(skip(self, update), fields(order_id = %order_id, customer_id = %customer_id))]
    pub async fn update_order(
        &self,
        order_id: i64,
        customer_id: i64,
        update: OrderUpdate,
    ) -> MarketResult<Order> {
        update.validate()?;
        let current = self.load_order(order_id).await?;
        Self::ensure_owner(&current, customer_id)?;
        if !current.is_available() {
            return Err(MarketError::OrderInaccessible { id: order_id });
        }
        if update.is_empty() {
            return Ok(current);
        }

        let update = OrderUpdate {
            price: update.price.map(pricing::normalize_price),
            ..update
        };
        let updated = self
            .orders
            .update(order_id, &update)
            .await?
            .ok_or(MarketError::OrderNotFound { id: order_id })?;

        if updated.price != current.price {
            let percent = pricing::change_percent(current.price, updated.price);
            self.audit
                .record(PriceEvent::updated(&updated, current.price, percent));
        }
        info!("更新订单成功: {}", updated.entity_description());
        Ok(updated)
    }

    /// `customer_id` 为 `None` 表示管理员操作，不校验所有者
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: i64, customer_id: Option<i64>) -> MarketResult<()> {
        let order = self.load_order(order_id).await?;
        if let Some(customer_id) = customer_id {
            Self::ensure_owner(&order, customer_id)?;
        }
        if !self.orders.delete(order_id).await? {
            return Err(MarketError::OrderNotFound { id: order_id });
        }
        info!("删除订单成功: {}", order.entity_description());
        Ok(())
    }

    /// 封禁订单，未指定截止时间时使用默认天数
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn block_order(
        &self,
        order_id: i64,
        until: Option<DateTime<Utc>>,
    ) -> MarketResult<Order> {
        let until = until.unwrap_or_else(|| Utc::now() + Duration::days(self.default_block_days));
        let order = self
            .orders
            .set_blocked(order_id, true, Some(until))
            .await?
            .ok_or(MarketError::OrderNotFound { id: order_id })?;
        info!("订单 {} 已封禁至 {}", order_id, until);
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn unblock_order(&self, order_id: i64) -> MarketResult<Order> {
        let order = self
            .orders
            .set_blocked(order_id, false, None)
            .await?
            .ok_or(MarketError::OrderNotFound { id: order_id })?;
        info!("订单 {} 已解除封禁", order_id);
        Ok(order)
    }

    /// 清除所有已过期的订单和用户封禁，可重复执行
    #[instrument(skip(self))]
    pub async fn auto_unblock_sweep(&self, now: DateTime<Utc>) -> MarketResult<SweepReport> {
        let orders = self.orders.unblock_expired(now).await?;
        let users = self.users.unblock_expired(now).await?;
        let report = SweepReport { orders, users };

        counter!("gigmarket_unblocked_orders_total").increment(orders);
        counter!("gigmarket_unblocked_users_total").increment(users);
        if report.is_empty() {
            debug!("没有需要解封的订单或用户");
        } else {
            info!("自动解封完成: 订单 {} 个，用户 {} 个", orders, users);
        }
        Ok(report)
    }

    /// 按允许的百分比调价并记录审计事件
    ///
    /// 价格在读取后被并发修改时返回 `Contention`，调用方可重试。
    #[instrument(skip(self), fields(order_id = %order_id, percent = %percent))]
    pub async fn adjust_price(
        &self,
        order_id: i64,
        customer_id: Option<i64>,
        percent: u32,
        direction: PriceDirection,
    ) -> MarketResult<Order> {
        let mut order = self.load_order(order_id).await?;
        if let Some(customer_id) = customer_id {
            Self::ensure_owner(&order, customer_id)?;
        }
        if !order.is_available() {
            return Err(MarketError::OrderInaccessible { id: order_id });
        }

        let old_price = order.price;
        let new_price = pricing::adjust_price(old_price, percent, direction)?;
        if !self
            .orders
            .update_price(order_id, old_price, new_price)
            .await?
        {
            return Err(MarketError::contention(format!(
                "订单 {order_id} 的价格已被并发修改"
            )));
        }

        order.price = new_price;
        self.audit
            .record(PriceEvent::updated(&order, old_price, Some(percent)));
        info!(
            "订单 {} 调价: {} -> {} ({:?} {}%)",
            order_id, old_price, new_price, direction, percent
        );
        Ok(order)
    }
}
