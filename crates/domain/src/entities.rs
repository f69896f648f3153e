use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use gigmarket_core::MarketError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 有序标签集合，订单与执行者之间的匹配单位
pub type TagSet = BTreeSet<String>;

/// 订单执行方式，创建后不可更改
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    Single,
    Team,
}

impl ExecutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionType::Single => "single",
            ExecutionType::Team => "team",
        }
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ExecutionType::Single),
            "team" => Ok(ExecutionType::Team),
            other => Err(MarketError::validation(format!("未知的执行方式: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub customer_id: i64,
    pub execution_type: ExecutionType,
    pub performer_id: Option<i64>,
    pub performer_team_id: Option<i64>,
    pub tags: TagSet,
    /// 第一张为主图
    pub images: Vec<String>,
    pub price: Decimal,
    pub is_blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 既未被封禁，也没有待生效的封禁截止时间
    pub fn is_available(&self) -> bool {
        !self.is_blocked && self.blocked_until.is_none()
    }

    pub fn is_unclaimed(&self) -> bool {
        self.performer_id.is_none() && self.performer_team_id.is_none()
    }

    pub fn matches_tags(&self, performer_tags: &TagSet) -> bool {
        !self.tags.is_disjoint(performer_tags)
    }

    /// 订单对该执行者可见的完整条件
    pub fn is_eligible_for(&self, performer_tags: &TagSet) -> bool {
        self.is_available() && self.is_unclaimed() && self.matches_tags(performer_tags)
    }

    pub fn main_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn entity_description(&self) -> String {
        format!(
            "订单 '{}' (ID: {}, 方式: {})",
            self.name, self.id, self.execution_type
        )
    }
}

/// 订单的认领状态，由订单和其关联团队推导
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Unassigned,
    AssignedSingle(i64),
    TeamOpen(i64),
    TeamClosed(i64),
}

impl ClaimState {
    pub fn of(order: &Order, team: Option<&Team>) -> Self {
        match (order.execution_type, order.performer_id, order.performer_team_id) {
            (ExecutionType::Single, Some(performer_id), _) => ClaimState::AssignedSingle(performer_id),
            (ExecutionType::Team, _, Some(team_id)) => match team {
                Some(team) if !team.is_open() => ClaimState::TeamClosed(team_id),
                _ => ClaimState::TeamOpen(team_id),
            },
            _ => ClaimState::Unassigned,
        }
    }
}

/// 执行者列表中展示的订单摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub customer_id: i64,
    pub execution_type: ExecutionType,
    pub images: Vec<String>,
    pub tags: TagSet,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            name: order.name.clone(),
            description: order.description.clone(),
            customer_id: order.customer_id,
            execution_type: order.execution_type,
            images: order.images.clone(),
            tags: order.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub name: String,
    pub description: Option<String>,
    pub execution_type: ExecutionType,
    pub price: Decimal,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.name.trim().is_empty() {
            return Err(MarketError::validation("订单名称不能为空"));
        }
        if self.price.is_sign_negative() {
            return Err(MarketError::validation("订单价格不能为负数"));
        }
        Ok(())
    }
}

/// 订单更新，存在的字段整体替换
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl OrderUpdate {
    pub fn validate(&self) -> Result<(), MarketError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(MarketError::validation("订单名称不能为空"));
            }
        }
        if let Some(price) = &self.price {
            if price.is_sign_negative() {
                return Err(MarketError::validation("订单价格不能为负数"));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.tags.is_none()
            && self.images.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Performer {
    pub id: i64,
    pub is_blocked: bool,
    pub specialities: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub customer_id: i64,
    pub lead_id: Option<i64>,
    /// 按加入顺序排列，无重复
    pub members: Vec<i64>,
}

impl Team {
    /// 未确定负责人之前，团队接受新成员
    pub fn is_open(&self) -> bool {
        self.lead_id.is_none()
    }

    pub fn has_member(&self, performer_id: i64) -> bool {
        self.members.contains(&performer_id)
    }
}

/// 带成员资料的团队视图
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamRoster {
    pub id: i64,
    pub name: String,
    pub lead: Option<UserProfile>,
    pub performers: Vec<UserProfile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceEventKind {
    Created,
    Updated,
}

impl PriceEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceEventKind::Created => "created",
            PriceEventKind::Updated => "updated",
        }
    }
}

/// 影响价格的订单事件，写入审计日志
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceEvent {
    pub kind: PriceEventKind,
    pub order_id: i64,
    pub customer_id: i64,
    pub order_name: String,
    pub order_tags: Vec<String>,
    pub old_price: Option<Decimal>,
    pub new_price: Decimal,
    pub percent: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

impl PriceEvent {
    pub fn created(order: &Order) -> Self {
        Self {
            kind: PriceEventKind::Created,
            order_id: order.id,
            customer_id: order.customer_id,
            order_name: order.name.clone(),
            order_tags: order.tags.iter().cloned().collect(),
            old_price: None,
            new_price: order.price,
            percent: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn updated(order: &Order, old_price: Decimal, percent: Option<u32>) -> Self {
        Self {
            kind: PriceEventKind::Updated,
            old_price: Some(old_price),
            percent,
            ..Self::created(order)
        }
    }
}

/// 自动解封的处理结果
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub orders: u64,
    pub users: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.orders == 0 && self.users == 0
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl Pagination {
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn order(execution_type: ExecutionType) -> Order {
        let now = Utc::now();
        Order {
            id: 1,
            name: "landing page".to_string(),
            description: None,
            customer_id: 10,
            execution_type,
            performer_id: None,
            performer_team_id: None,
            tags: ["design".to_string()].into_iter().collect(),
            images: vec!["main.png".to_string(), "extra.png".to_string()],
            price: Decimal::new(10000, 2),
            is_blocked: false,
            blocked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_execution_type_parsing() {
        assert_eq!("single".parse::<ExecutionType>().unwrap(), ExecutionType::Single);
        assert_eq!("team".parse::<ExecutionType>().unwrap(), ExecutionType::Team);
        assert!("crowd".parse::<ExecutionType>().is_err());
        assert_eq!(
            serde_json::to_string(&ExecutionType::Team).unwrap(),
            "\"team\""
        );
    }

    #[test]
    fn test_eligibility_predicate() {
        let design: TagSet = ["design".to_string(), "marketing".to_string()]
            .into_iter()
            .collect();
        let writing: TagSet = ["writing".to_string()].into_iter().collect();

        let mut o = order(ExecutionType::Single);
        assert!(o.is_eligible_for(&design));
        assert!(!o.is_eligible_for(&writing));
        assert!(!o.is_eligible_for(&TagSet::new()));

        o.blocked_until = Some(Utc::now());
        assert!(!o.is_eligible_for(&design));

        o.blocked_until = None;
        o.performer_id = Some(5);
        assert!(!o.is_eligible_for(&design));
        assert_eq!(o.main_image(), Some("main.png"));
    }

    #[test]
    fn test_claim_state_derivation() {
        let mut single = order(ExecutionType::Single);
        assert_eq!(ClaimState::of(&single, None), ClaimState::Unassigned);
        single.performer_id = Some(7);
        assert_eq!(ClaimState::of(&single, None), ClaimState::AssignedSingle(7));

        let mut team_order = order(ExecutionType::Team);
        team_order.performer_team_id = Some(3);
        let mut team = Team {
            id: 3,
            name: "Hyper_Coders_A1F".to_string(),
            customer_id: 10,
            lead_id: None,
            members: vec![7],
        };
        assert_eq!(ClaimState::of(&team_order, Some(&team)), ClaimState::TeamOpen(3));
        team.lead_id = Some(7);
        assert_eq!(
            ClaimState::of(&team_order, Some(&team)),
            ClaimState::TeamClosed(3)
        );
    }

    #[test]
    fn test_new_order_validation() {
        let mut new_order = NewOrder {
            name: "  ".to_string(),
            description: None,
            execution_type: ExecutionType::Single,
            price: Decimal::new(500, 2),
            tags: vec![],
            images: vec![],
        };
        assert!(new_order.validate().is_err());

        new_order.name = "logo".to_string();
        assert!(new_order.validate().is_ok());

        new_order.price = Decimal::new(-1, 0);
        assert!(new_order.validate().is_err());
    }

    #[test]
    fn test_pagination() {
        let items: Vec<i32> = (1..=10).collect();
        let page = Pagination {
            limit: Some(3),
            offset: 2,
        };
        assert_eq!(page.apply(items.clone()), vec![3, 4, 5]);
        assert_eq!(Pagination::default().apply(items.clone()).len(), 10);
        let beyond = Pagination {
            limit: None,
            offset: 20,
        };
        assert!(beyond.apply(items).is_empty());
    }

    #[test]
    fn test_price_event_construction() {
        let o = order(ExecutionType::Single);
        let event = PriceEvent::updated(&o, Decimal::new(8000, 2), Some(25));
        assert_eq!(event.kind, PriceEventKind::Updated);
        assert_eq!(event.old_price, Some(Decimal::new(8000, 2)));
        assert_eq!(event.new_price, o.price);
        assert_eq!(event.order_tags, vec!["design".to_string()]);
    }
}
