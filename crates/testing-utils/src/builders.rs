//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{DateTime, Utc};
use gigmarket_domain::entities::{ExecutionType, NewOrder, Order, Team, UserProfile};
use rust_decimal::Decimal;

pub fn profile(id: i64, username: &str) -> UserProfile {
    UserProfile {
        id,
        username: username.to_string(),
        first_name: Some(format!("First{id}")),
        last_name: Some(format!("Last{id}")),
        photo_link: None,
    }
}

/// Builder for creating test Order entities
pub struct OrderBuilder {
    order: Order,
}

impl OrderBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            order: Order {
                id: 1,
                name: "test_order".to_string(),
                description: None,
                customer_id: 100,
                execution_type: ExecutionType::Single,
                performer_id: None,
                performer_team_id: None,
                tags: Default::default(),
                images: vec![],
                price: Decimal::new(10000, 2),
                is_blocked: false,
                blocked_until: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.order.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.order.name = name.to_string();
        self
    }

    pub fn with_customer(mut self, customer_id: i64) -> Self {
        self.order.customer_id = customer_id;
        self
    }

    pub fn team(mut self) -> Self {
        self.order.execution_type = ExecutionType::Team;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.order.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_images(mut self, images: &[&str]) -> Self {
        self.order.images = images.iter().map(|i| i.to_string()).collect();
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.order.price = price;
        self
    }

    pub fn assigned_to(mut self, performer_id: i64) -> Self {
        self.order.performer_id = Some(performer_id);
        self
    }

    pub fn with_team(mut self, team_id: i64) -> Self {
        self.order.execution_type = ExecutionType::Team;
        self.order.performer_team_id = Some(team_id);
        self
    }

    pub fn blocked_until(mut self, until: DateTime<Utc>) -> Self {
        self.order.is_blocked = true;
        self.order.blocked_until = Some(until);
        self
    }

    pub fn build(self) -> Order {
        self.order
    }
}

impl Default for OrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the customer-facing order creation payload
pub struct NewOrderBuilder {
    new_order: NewOrder,
}

impl NewOrderBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            new_order: NewOrder {
                name: name.to_string(),
                description: None,
                execution_type: ExecutionType::Single,
                price: Decimal::new(10000, 2),
                tags: vec![],
                images: vec![],
            },
        }
    }

    pub fn team(mut self) -> Self {
        self.new_order.execution_type = ExecutionType::Team;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.new_order.description = Some(description.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.new_order.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_images(mut self, images: &[&str]) -> Self {
        self.new_order.images = images.iter().map(|i| i.to_string()).collect();
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.new_order.price = price;
        self
    }

    pub fn build(self) -> NewOrder {
        self.new_order
    }
}

pub struct TeamBuilder {
    team: Team,
}

impl TeamBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            team: Team {
                id,
                name: format!("Hyper_Coders_{id:03X}"),
                customer_id: 100,
                lead_id: None,
                members: vec![],
            },
        }
    }

    pub fn with_customer(mut self, customer_id: i64) -> Self {
        self.team.customer_id = customer_id;
        self
    }

    pub fn with_members(mut self, members: &[i64]) -> Self {
        self.team.members = members.to_vec();
        self
    }

    pub fn with_lead(mut self, lead_id: i64) -> Self {
        self.team.lead_id = Some(lead_id);
        self
    }

    pub fn build(self) -> Team {
        self.team
    }
}
