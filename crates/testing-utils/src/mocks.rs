//! In-memory implementations of the repository ports
//!
//! `InMemoryMarket` keeps users, orders, teams and the speciality catalog in
//! one shared state. Claims take a per-order `tokio::sync::Mutex`, so
//! concurrent claims on the same order serialize the same way row locks do
//! in the SQL repositories.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigmarket_core::{MarketError, MarketResult};
use gigmarket_domain::entities::{
    Customer, NewOrder, Order, OrderUpdate, Performer, PriceEvent, TagSet, Team, UserProfile,
};
use gigmarket_domain::repositories::{
    AuditLogRepository, ClaimTransaction, OrderAuditLog, OrderRepository, SpecialityCatalog,
    TeamRepository, UserDirectory,
};
use gigmarket_domain::TagIndex;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub profile: UserProfile,
    pub is_blocked: bool,
    pub block_expired: Option<DateTime<Utc>>,
    pub specialities: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct MarketState {
    users: BTreeMap<i64, UserRecord>,
    orders: BTreeMap<i64, Order>,
    teams: BTreeMap<i64, Team>,
    speciality_tags: Vec<(String, String)>,
    audit_events: Vec<PriceEvent>,
    next_order_id: i64,
    next_team_id: i64,
}

/// In-memory marketplace backing every repository port
#[derive(Clone)]
pub struct InMemoryMarket {
    state: Arc<Mutex<MarketState>>,
    row_locks: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
    lock_timeout: Duration,
    fail_audit_writes: Arc<AtomicBool>,
}

impl InMemoryMarket {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MarketState {
                next_order_id: 1,
                next_team_id: 1,
                ..MarketState::default()
            })),
            row_locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout: Duration::from_secs(1),
            fail_audit_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn add_user(&self, profile: UserProfile) {
        let mut state = self.state.lock().unwrap();
        state.users.insert(
            profile.id,
            UserRecord {
                profile,
                is_blocked: false,
                block_expired: None,
                specialities: BTreeSet::new(),
            },
        );
    }

    /// Registers a user with the given specialities
    pub fn add_performer(&self, id: i64, specialities: &[&str]) {
        self.add_user(crate::builders::profile(id, &format!("performer{id}")));
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(&id) {
            user.specialities = specialities.iter().map(|s| s.to_string()).collect();
        }
    }

    pub fn add_customer(&self, id: i64) {
        self.add_user(crate::builders::profile(id, &format!("customer{id}")));
    }

    pub fn block_user(&self, id: i64, until: Option<DateTime<Utc>>) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(&id) {
            user.is_blocked = true;
            user.block_expired = until;
        }
    }

    pub fn user(&self, id: i64) -> Option<UserRecord> {
        self.state.lock().unwrap().users.get(&id).cloned()
    }

    pub fn add_speciality_tags(&self, speciality: &str, tags: &[&str]) {
        let mut state = self.state.lock().unwrap();
        for tag in tags {
            state
                .speciality_tags
                .push((speciality.to_string(), tag.to_string()));
        }
    }

    /// Stores an order as-is, keeping its id
    pub fn insert_order(&self, order: Order) -> Order {
        let mut state = self.state.lock().unwrap();
        state.next_order_id = state.next_order_id.max(order.id + 1);
        state.orders.insert(order.id, order.clone());
        order
    }

    pub fn order(&self, id: i64) -> Option<Order> {
        self.state.lock().unwrap().orders.get(&id).cloned()
    }

    pub fn insert_team(&self, team: Team) -> Team {
        let mut state = self.state.lock().unwrap();
        state.next_team_id = state.next_team_id.max(team.id + 1);
        state.teams.insert(team.id, team.clone());
        team
    }

    pub fn team(&self, id: i64) -> Option<Team> {
        self.state.lock().unwrap().teams.get(&id).cloned()
    }

    pub fn team_count(&self) -> usize {
        self.state.lock().unwrap().teams.len()
    }

    pub fn audit_events(&self) -> Vec<PriceEvent> {
        self.state.lock().unwrap().audit_events.clone()
    }

    pub fn set_audit_failure(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    fn row_lock(&self, order_id: i64) -> Arc<AsyncMutex<()>> {
        let mut locks = self.row_locks.lock().unwrap();
        locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

impl Default for InMemoryMarket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryMarket {
    async fn create(&self, customer_id: i64, new_order: &NewOrder) -> MarketResult<Order> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let order = Order {
            id: state.next_order_id,
            name: new_order.name.clone(),
            description: new_order.description.clone(),
            customer_id,
            execution_type: new_order.execution_type,
            performer_id: None,
            performer_team_id: None,
            tags: new_order.tags.iter().cloned().collect(),
            images: new_order.images.clone(),
            price: new_order.price,
            is_blocked: false,
            blocked_until: None,
            created_at: now,
            updated_at: now,
        };
        state.next_order_id += 1;
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: i64) -> MarketResult<Option<Order>> {
        Ok(self.order(id))
    }

    async fn find_eligible(&self, tags: &TagSet) -> MarketResult<Vec<Order>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .values()
            .filter(|order| order.is_eligible_for(tags))
            .cloned()
            .collect())
    }

    async fn find_by_customer(&self, customer_id: i64) -> MarketResult<Vec<Order>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn find_assigned_to(&self, performer_id: i64) -> MarketResult<Vec<Order>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .values()
            .filter(|order| order.is_available())
            .filter(|order| {
                order.performer_id == Some(performer_id)
                    || order
                        .performer_team_id
                        .and_then(|team_id| state.teams.get(&team_id))
                        .is_some_and(|team| team.has_member(performer_id))
            })
            .cloned()
            .collect())
    }

    async fn update(&self, id: i64, update: &OrderUpdate) -> MarketResult<Option<Order>> {
        let mut state = self.state.lock().unwrap();
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            order.name = name.clone();
        }
        if let Some(description) = &update.description {
            order.description = Some(description.clone());
        }
        if let Some(price) = update.price {
            order.price = price;
        }
        if let Some(tags) = &update.tags {
            order.tags = tags.iter().cloned().collect();
        }
        if let Some(images) = &update.images {
            order.images = images.clone();
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn update_price(&self, id: i64, expected: Decimal, new_price: Decimal) -> MarketResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.orders.get_mut(&id) {
            Some(order) if order.price == expected => {
                order.price = new_price;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> MarketResult<bool> {
        Ok(self.state.lock().unwrap().orders.remove(&id).is_some())
    }

    async fn set_blocked(
        &self,
        id: i64,
        is_blocked: bool,
        blocked_until: Option<DateTime<Utc>>,
    ) -> MarketResult<Option<Order>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.orders.get_mut(&id).map(|order| {
            order.is_blocked = is_blocked;
            order.blocked_until = blocked_until;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn unblock_expired(&self, now: DateTime<Utc>) -> MarketResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut cleared = 0;
        for order in state.orders.values_mut() {
            if order.is_blocked && order.blocked_until.is_some_and(|until| until < now) {
                order.is_blocked = false;
                order.blocked_until = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn begin_claim(&self, order_id: i64) -> MarketResult<Option<Box<dyn ClaimTransaction>>> {
        let guard = tokio::time::timeout(self.lock_timeout, self.row_lock(order_id).lock_owned())
            .await
            .map_err(|_| MarketError::contention(format!("等待订单 {order_id} 的行锁超时")))?;

        let Some(order) = self.order(order_id) else {
            return Ok(None);
        };
        Ok(Some(Box::new(InMemoryClaim {
            state: self.state.clone(),
            _guard: guard,
            order,
            assigned: None,
            created_team: None,
            new_members: Vec::new(),
        })))
    }
}

/// Claim transaction buffering its writes until commit
pub struct InMemoryClaim {
    state: Arc<Mutex<MarketState>>,
    _guard: OwnedMutexGuard<()>,
    order: Order,
    assigned: Option<i64>,
    created_team: Option<Team>,
    new_members: Vec<(i64, i64)>,
}

impl InMemoryClaim {
    fn is_member(&self, team_id: i64, performer_id: i64) -> bool {
        let pending = self
            .new_members
            .iter()
            .any(|(team, performer)| *team == team_id && *performer == performer_id);
        let stored = self
            .state
            .lock()
            .unwrap()
            .teams
            .get(&team_id)
            .is_some_and(|team| team.has_member(performer_id));
        pending || stored
    }
}

#[async_trait]
impl ClaimTransaction for InMemoryClaim {
    fn order(&self) -> &Order {
        &self.order
    }

    async fn assign_performer(&mut self, performer_id: i64) -> MarketResult<bool> {
        if self.order.performer_id.is_some() {
            return Ok(false);
        }
        self.order.performer_id = Some(performer_id);
        self.assigned = Some(performer_id);
        Ok(true)
    }

    async fn find_team(&mut self, team_id: i64) -> MarketResult<Option<Team>> {
        let mut team = match &self.created_team {
            Some(team) if team.id == team_id => Some(team.clone()),
            _ => self.state.lock().unwrap().teams.get(&team_id).cloned(),
        };
        if let Some(team) = team.as_mut() {
            for (pending_team, performer) in &self.new_members {
                if *pending_team == team_id && !team.has_member(*performer) {
                    team.members.push(*performer);
                }
            }
        }
        Ok(team)
    }

    async fn create_team(&mut self, name: &str) -> MarketResult<Team> {
        if self.order.performer_team_id.is_some() {
            return Err(MarketError::internal(format!(
                "订单 {} 已关联团队",
                self.order.id
            )));
        }
        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_team_id;
            state.next_team_id += 1;
            id
        };
        let team = Team {
            id,
            name: name.to_string(),
            customer_id: self.order.customer_id,
            lead_id: None,
            members: Vec::new(),
        };
        self.order.performer_team_id = Some(id);
        self.created_team = Some(team.clone());
        Ok(team)
    }

    async fn add_team_member(&mut self, team_id: i64, performer_id: i64) -> MarketResult<bool> {
        if self.is_member(team_id, performer_id) {
            return Ok(false);
        }
        self.new_members.push((team_id, performer_id));
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> MarketResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(team) = &self.created_team {
            state.teams.insert(team.id, team.clone());
        }
        for (team_id, performer_id) in &self.new_members {
            if let Some(team) = state.teams.get_mut(team_id) {
                if !team.has_member(*performer_id) {
                    team.members.push(*performer_id);
                }
            }
        }
        if let Some(order) = state.orders.get_mut(&self.order.id) {
            if let Some(performer_id) = self.assigned {
                order.performer_id = Some(performer_id);
            }
            if self.created_team.is_some() {
                order.performer_team_id = self.order.performer_team_id;
            }
            order.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl TeamRepository for InMemoryMarket {
    async fn find_by_id(&self, id: i64) -> MarketResult<Option<Team>> {
        Ok(self.team(id))
    }

    async fn assign_lead(&self, team_id: i64, performer_id: i64) -> MarketResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.teams.get_mut(&team_id) {
            Some(team) if team.lead_id.is_none() => {
                team.lead_id = Some(performer_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryMarket {
    async fn find_performer(&self, id: i64) -> MarketResult<Option<Performer>> {
        Ok(self.user(id).map(|user| Performer {
            id,
            is_blocked: user.is_blocked,
            specialities: user.specialities,
        }))
    }

    async fn find_customer(&self, id: i64) -> MarketResult<Option<Customer>> {
        Ok(self.user(id).map(|user| Customer {
            id,
            is_blocked: user.is_blocked,
        }))
    }

    async fn find_profile(&self, id: i64) -> MarketResult<Option<UserProfile>> {
        Ok(self.user(id).map(|user| user.profile))
    }

    async fn find_profiles(&self, ids: &[i64]) -> MarketResult<Vec<UserProfile>> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|user| user.profile.clone()))
            .collect())
    }

    async fn unblock_expired(&self, now: DateTime<Utc>) -> MarketResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut cleared = 0;
        for user in state.users.values_mut() {
            if user.is_blocked && user.block_expired.is_some_and(|until| until < now) {
                user.is_blocked = false;
                user.block_expired = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[async_trait]
impl SpecialityCatalog for InMemoryMarket {
    async fn load_index(&self) -> MarketResult<TagIndex> {
        let pairs = self.state.lock().unwrap().speciality_tags.clone();
        Ok(TagIndex::from_pairs(pairs))
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryMarket {
    async fn insert(&self, event: &PriceEvent) -> MarketResult<()> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(MarketError::internal("审计日志写入失败"));
        }
        self.state.lock().unwrap().audit_events.push(event.clone());
        Ok(())
    }
}

/// Audit log port that keeps every recorded event in memory
#[derive(Debug, Default)]
pub struct RecordingAuditLog {
    events: Mutex<Vec<PriceEvent>>,
}

impl RecordingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PriceEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl OrderAuditLog for RecordingAuditLog {
    fn record(&self, event: PriceEvent) {
        self.events.lock().unwrap().push(event);
    }
}
