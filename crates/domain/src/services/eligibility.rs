use std::sync::Arc;

use gigmarket_core::MarketResult;
use tracing::{debug, instrument};

use crate::entities::{OrderSummary, Pagination, TagSet};
use crate::repositories::{OrderRepository, SpecialityCatalog, UserDirectory};

use super::load_active_performer;

/// 计算执行者当前可认领的订单
pub struct EligibilityService {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn SpecialityCatalog>,
}

impl EligibilityService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserDirectory>,
        catalog: Arc<dyn SpecialityCatalog>,
    ) -> Self {
        Self {
            orders,
            users,
            catalog,
        }
    }

    /// 执行者的专长展开后的标签集合
    pub async fn performer_tags(&self, performer_id: i64) -> MarketResult<TagSet> {
        let performer = load_active_performer(self.users.as_ref(), performer_id).await?;
        let index = self.catalog.load_index().await?;
        Ok(index.tags_for(&performer))
    }

    /// 返回某一时刻的快照，按订单id排序
    #[instrument(skip(self), fields(performer_id = %performer_id))]
    pub async fn list_eligible_orders(
        &self,
        performer_id: i64,
        page: Pagination,
    ) -> MarketResult<Vec<OrderSummary>> {
        let tags = self.performer_tags(performer_id).await?;
        if tags.is_empty() {
            debug!("执行者 {} 没有可匹配的标签", performer_id);
            return Ok(Vec::new());
        }

        let orders = self.orders.find_eligible(&tags).await?;
        debug!(
            "执行者 {} 可认领订单 {} 个，标签: {:?}",
            performer_id,
            orders.len(),
            tags
        );

        Ok(page
            .apply(orders)
            .iter()
            .map(OrderSummary::from)
            .collect())
    }
}
