use std::sync::Arc;

use gigmarket_core::{retry_with_backoff, MarketError, MarketResult, RetryConfig};
use metrics::counter;
use tracing::{error, info, instrument, warn};

use crate::entities::{ExecutionType, Order, TeamRoster, UserProfile};
use crate::repositories::{ClaimTransaction, OrderRepository, SpecialityCatalog, UserDirectory};
use crate::team_naming::generate_team_name;

use super::{load_active_performer, TeamRegistry};

/// 认领成功后的订单及其执行方
#[derive(Debug, Clone)]
pub enum AssignmentResult {
    AssignedSingle { order: Order, performer: UserProfile },
    JoinedTeam { order: Order, team: TeamRoster },
    CreatedTeam { order: Order, team: TeamRoster },
}

impl AssignmentResult {
    pub fn order(&self) -> &Order {
        match self {
            AssignmentResult::AssignedSingle { order, .. }
            | AssignmentResult::JoinedTeam { order, .. }
            | AssignmentResult::CreatedTeam { order, .. } => order,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            AssignmentResult::AssignedSingle { .. } => "assigned_single",
            AssignmentResult::JoinedTeam { .. } => "joined_team",
            AssignmentResult::CreatedTeam { .. } => "created_team",
        }
    }
}

#[derive(Debug, Clone)]
enum Claimed {
    Single(Order),
    Joined(Order, i64),
    Created(Order, i64),
}

fn rejection_label(err: &MarketError) -> &'static str {
    match err {
        MarketError::OrderNotFound { .. } => "order_not_found",
        MarketError::OrderInaccessible { .. } => "order_inaccessible",
        MarketError::AlreadyAssigned { .. } => "already_assigned",
        MarketError::AlreadyTaken { .. } => "already_taken",
        MarketError::TeamNotFound { .. } => "team_not_found",
        MarketError::Contention(_) => "contention",
        MarketError::PerformerNotFound { .. } | MarketError::PerformerBlocked { .. } => {
            "performer_rejected"
        }
        _ => "error",
    }
}

/// 订单认领事务
///
/// 读取、校验和写入都在持有订单行锁的同一个事务里完成，
/// 同一订单上的并发认领因此是线性化的。
pub struct AssignmentService {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn SpecialityCatalog>,
    teams: Arc<TeamRegistry>,
}

impl AssignmentService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserDirectory>,
        catalog: Arc<dyn SpecialityCatalog>,
        teams: Arc<TeamRegistry>,
    ) -> Self {
        Self {
            orders,
            users,
            catalog,
            teams,
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id, performer_id = %performer_id))]
    pub async fn assign_performer(
        &self,
        order_id: i64,
        performer_id: i64,
    ) -> MarketResult<AssignmentResult> {
        let result = match self.claim_committed(order_id, performer_id).await {
            Ok(claimed) => self
                .hydrate(claimed, performer_id)
                .await
                .map_err(|e| Self::after_commit(order_id, e)),
            Err(err) => Err(err),
        };
        Self::record_outcome(result)
    }

    /// 认领订单，资源争用时按 `retry` 重试
    ///
    /// 只有认领事务本身会被重新执行。提交之后加载执行方信息的读取单独重试，
    /// 已提交的认领不会被第二个事务重复判定。
    #[instrument(skip(self, retry), fields(order_id = %order_id, performer_id = %performer_id))]
    pub async fn assign_performer_with_retry(
        &self,
        order_id: i64,
        performer_id: i64,
        retry: &RetryConfig,
    ) -> MarketResult<AssignmentResult> {
        let claimed = retry_with_backoff(retry, "认领订单", || {
            self.claim_committed(order_id, performer_id)
        })
        .await;

        let result = match claimed {
            Ok(claimed) => retry_with_backoff(retry, "加载认领结果", || {
                self.hydrate(claimed.clone(), performer_id)
            })
            .await
            .map_err(|e| Self::after_commit(order_id, e)),
            Err(err) => Err(err),
        };
        Self::record_outcome(result)
    }

    fn record_outcome(result: MarketResult<AssignmentResult>) -> MarketResult<AssignmentResult> {
        let outcome = match &result {
            Ok(result) => result.outcome(),
            Err(err) => rejection_label(err),
        };
        counter!("gigmarket_claims_total", "outcome" => outcome).increment(1);
        result
    }

    /// 提交后的错误不可重试：认领已经生效
    fn after_commit(order_id: i64, err: MarketError) -> MarketError {
        error!("订单 {} 的认领已提交，但后续处理失败: {}", order_id, err);
        MarketError::internal(format!("订单 {order_id} 已认领，加载认领结果失败: {err}"))
    }

    /// 在一个事务里完成校验和写入，成功返回时事务已提交
    async fn claim_committed(&self, order_id: i64, performer_id: i64) -> MarketResult<Claimed> {
        if self.orders.find_by_id(order_id).await?.is_none() {
            return Err(MarketError::OrderNotFound { id: order_id });
        }
        let performer = load_active_performer(self.users.as_ref(), performer_id).await?;
        let performer_tags = self.catalog.load_index().await?.tags_for(&performer);

        let mut tx = self
            .orders
            .begin_claim(order_id)
            .await?
            .ok_or(MarketError::OrderNotFound { id: order_id })?;

        let order = tx.order().clone();
        if !order.is_available() || !order.matches_tags(&performer_tags) {
            return Err(MarketError::OrderInaccessible { id: order_id });
        }

        let claimed = match order.execution_type {
            ExecutionType::Single => Self::claim_single(tx.as_mut(), order, performer_id).await?,
            ExecutionType::Team => Self::claim_team(tx.as_mut(), order, performer_id).await?,
        };
        if let Err(e) = tx.commit().await {
            error!("订单 {} 的认领提交失败: {}", order_id, e);
            return Err(MarketError::internal(format!(
                "订单 {order_id} 认领提交失败，结果未知: {e}"
            )));
        }

        Ok(claimed)
    }

    async fn claim_single(
        tx: &mut dyn ClaimTransaction,
        mut order: Order,
        performer_id: i64,
    ) -> MarketResult<Claimed> {
        match order.performer_id {
            Some(current) if current == performer_id => Err(MarketError::AlreadyAssigned {
                order_id: order.id,
                performer_id,
            }),
            Some(_) => Err(MarketError::AlreadyTaken { order_id: order.id }),
            None => {
                if !tx.assign_performer(performer_id).await? {
                    return Err(MarketError::AlreadyTaken { order_id: order.id });
                }
                info!("订单 {} 已指派给执行者 {}", order.id, performer_id);
                order.performer_id = Some(performer_id);
                Ok(Claimed::Single(order))
            }
        }
    }

    async fn claim_team(
        tx: &mut dyn ClaimTransaction,
        mut order: Order,
        performer_id: i64,
    ) -> MarketResult<Claimed> {
        match order.performer_team_id {
            None => {
                let name = generate_team_name(&order.tags, &mut rand::rng());
                let team = tx.create_team(&name).await?;
                tx.add_team_member(team.id, performer_id).await?;
                info!(
                    "订单 {} 创建团队 {} ({})，首位成员: {}",
                    order.id, team.name, team.id, performer_id
                );
                order.performer_team_id = Some(team.id);
                Ok(Claimed::Created(order, team.id))
            }
            Some(team_id) => {
                let team = match tx.find_team(team_id).await? {
                    Some(team) => team,
                    None => {
                        error!(
                            "订单 {} 关联的团队 {} 不存在，数据一致性异常",
                            order.id, team_id
                        );
                        return Err(MarketError::TeamNotFound { id: team_id });
                    }
                };
                if !team.is_open() {
                    return Err(MarketError::OrderInaccessible { id: order.id });
                }
                if !tx.add_team_member(team_id, performer_id).await? {
                    warn!("执行者 {} 已是团队 {} 的成员", performer_id, team_id);
                }
                info!("执行者 {} 加入订单 {} 的团队 {}", performer_id, order.id, team_id);
                Ok(Claimed::Joined(order, team_id))
            }
        }
    }

    async fn hydrate(&self, claimed: Claimed, performer_id: i64) -> MarketResult<AssignmentResult> {
        match claimed {
            Claimed::Single(order) => {
                let performer = self
                    .users
                    .find_profile(performer_id)
                    .await?
                    .ok_or(MarketError::PerformerNotFound { id: performer_id })?;
                Ok(AssignmentResult::AssignedSingle { order, performer })
            }
            Claimed::Joined(order, team_id) => {
                let team = self.teams.get_team_with_members(team_id).await?;
                Ok(AssignmentResult::JoinedTeam { order, team })
            }
            Claimed::Created(order, team_id) => {
                let team = self.teams.get_team_with_members(team_id).await?;
                Ok(AssignmentResult::CreatedTeam { order, team })
            }
        }
    }
}
