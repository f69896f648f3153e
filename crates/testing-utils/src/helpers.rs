//! Test helper utilities and common testing patterns

use std::sync::Arc;
use std::time::Duration;

use gigmarket_domain::services::{
    AssignmentService, EligibilityService, OrderLifecycleService, TeamRegistry,
};
use tokio::time::sleep;

use crate::mocks::{InMemoryMarket, RecordingAuditLog};

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }

        false
    }
}

/// Every domain service wired against one in-memory market
pub struct TestServices {
    pub market: InMemoryMarket,
    pub audit: Arc<RecordingAuditLog>,
    pub eligibility: Arc<EligibilityService>,
    pub assignment: Arc<AssignmentService>,
    pub teams: Arc<TeamRegistry>,
    pub lifecycle: Arc<OrderLifecycleService>,
}

impl TestServices {
    pub fn new(market: InMemoryMarket) -> Self {
        let shared = Arc::new(market.clone());
        let audit = Arc::new(RecordingAuditLog::new());

        let teams = Arc::new(TeamRegistry::new(shared.clone(), shared.clone()));
        let eligibility = Arc::new(EligibilityService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
        ));
        let assignment = Arc::new(AssignmentService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            teams.clone(),
        ));
        let lifecycle = Arc::new(OrderLifecycleService::new(
            shared.clone(),
            shared,
            audit.clone(),
            30,
        ));

        Self {
            market,
            audit,
            eligibility,
            assignment,
            teams,
            lifecycle,
        }
    }

    /// The marketplace used throughout the end-to-end scenarios:
    /// customer 100, performer 1 (design + marketing), performer 2 (writing),
    /// performer 3 (design).
    pub fn seeded() -> Self {
        let market = InMemoryMarket::new();
        market.add_customer(100);
        market.add_speciality_tags("designer", &["design"]);
        market.add_speciality_tags("smm", &["marketing"]);
        market.add_speciality_tags("copywriter", &["writing"]);
        market.add_performer(1, &["designer", "smm"]);
        market.add_performer(2, &["copywriter"]);
        market.add_performer(3, &["designer"]);
        Self::new(market)
    }
}
