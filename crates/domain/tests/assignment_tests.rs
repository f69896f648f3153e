use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigmarket_core::RetryConfig;
use gigmarket_domain::{
    AssignmentResult, AssignmentService, ClaimTransaction, Customer, MarketError, MarketResult,
    OrderRepository, Pagination, Performer, TeamRegistry, UserDirectory, UserProfile,
};
use gigmarket_testing_utils::{InMemoryMarket, OrderBuilder, TeamBuilder, TestServices};

/// 前 `failures` 次读取执行者资料返回资源争用
struct FlakyProfiles {
    inner: InMemoryMarket,
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl UserDirectory for FlakyProfiles {
    async fn find_performer(&self, id: i64) -> MarketResult<Option<Performer>> {
        self.inner.find_performer(id).await
    }

    async fn find_customer(&self, id: i64) -> MarketResult<Option<Customer>> {
        self.inner.find_customer(id).await
    }

    async fn find_profile(&self, id: i64) -> MarketResult<Option<UserProfile>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(MarketError::contention("连接池繁忙"));
        }
        self.inner.find_profile(id).await
    }

    async fn find_profiles(&self, ids: &[i64]) -> MarketResult<Vec<UserProfile>> {
        self.inner.find_profiles(ids).await
    }

    async fn unblock_expired(&self, now: DateTime<Utc>) -> MarketResult<u64> {
        UserDirectory::unblock_expired(&self.inner, now).await
    }
}

fn flaky_assignment(services: &TestServices, failures: usize) -> AssignmentService {
    let shared = Arc::new(services.market.clone());
    let users = Arc::new(FlakyProfiles {
        inner: services.market.clone(),
        failures,
        calls: AtomicUsize::new(0),
    });
    AssignmentService::new(
        shared.clone(),
        users,
        shared.clone(),
        Arc::new(TeamRegistry::new(shared.clone(), shared)),
    )
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
    }
}

#[tokio::test]
async fn test_end_to_end_single_order_scenario() {
    let services = TestServices::seeded();
    services
        .market
        .insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());

    let p1 = services
        .eligibility
        .list_eligible_orders(1, Pagination::default())
        .await
        .unwrap();
    assert_eq!(p1.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1]);

    let p2 = services
        .eligibility
        .list_eligible_orders(2, Pagination::default())
        .await
        .unwrap();
    assert!(p2.is_empty());

    let err = services.assignment.assign_performer(1, 2).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderInaccessible { id: 1 }));

    let result = services.assignment.assign_performer(1, 1).await.unwrap();
    match &result {
        AssignmentResult::AssignedSingle { order, performer } => {
            assert_eq!(order.performer_id, Some(1));
            assert_eq!(performer.username, "performer1");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(result.outcome(), "assigned_single");
    assert_eq!(services.market.order(1).unwrap().performer_id, Some(1));

    let err = services.assignment.assign_performer(1, 1).await.unwrap_err();
    assert!(matches!(
        err,
        MarketError::AlreadyAssigned {
            order_id: 1,
            performer_id: 1
        }
    ));

    let after = services
        .eligibility
        .list_eligible_orders(1, Pagination::default())
        .await
        .unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn test_other_performer_gets_already_taken() {
    let services = TestServices::seeded();
    services
        .market
        .insert_order(OrderBuilder::new().with_id(5).with_tags(&["design"]).build());

    services.assignment.assign_performer(5, 1).await.unwrap();
    let err = services.assignment.assign_performer(5, 3).await.unwrap_err();
    assert!(matches!(err, MarketError::AlreadyTaken { order_id: 5 }));
}

#[tokio::test]
async fn test_concurrent_single_claims_have_one_winner() {
    let market = InMemoryMarket::new();
    market.add_customer(100);
    market.add_speciality_tags("designer", &["design"]);
    for performer_id in 1..=10 {
        market.add_performer(performer_id, &["designer"]);
    }
    market.insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());
    let services = Arc::new(TestServices::new(market));

    let handles: Vec<_> = (1..=10)
        .map(|performer_id| {
            let assignment = services.assignment.clone();
            tokio::spawn(async move { assignment.assign_performer(1, performer_id).await })
        })
        .collect();

    let mut winners = 0;
    let mut taken = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(MarketError::AlreadyTaken { .. }) => taken += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(taken, 9);
}

#[tokio::test]
async fn test_team_growth_creates_one_team() {
    let services = TestServices::seeded();
    services.market.insert_order(
        OrderBuilder::new()
            .with_id(7)
            .team()
            .with_tags(&["design", "writing"])
            .build(),
    );

    let first = services.assignment.assign_performer(7, 1).await.unwrap();
    let team_id = match &first {
        AssignmentResult::CreatedTeam { order, team } => {
            assert_eq!(order.performer_team_id, Some(team.id));
            assert_eq!(team.performers.len(), 1);
            assert!(team.lead.is_none());
            team.id
        }
        other => panic!("unexpected result: {other:?}"),
    };

    let second = services.assignment.assign_performer(7, 2).await.unwrap();
    match &second {
        AssignmentResult::JoinedTeam { team, .. } => {
            assert_eq!(team.id, team_id);
            let ids: Vec<i64> = team.performers.iter().map(|p| p.id).collect();
            assert_eq!(ids, vec![1, 2]);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert_eq!(services.market.team_count(), 1);
    let team = services.market.team(team_id).unwrap();
    assert_eq!(team.customer_id, 100);
    assert_eq!(team.members, vec![1, 2]);
    assert!(team.lead_id.is_none());
    assert_eq!(team.name.split('_').count(), 3);
}

#[tokio::test]
async fn test_concurrent_first_team_claims_create_single_team() {
    let market = InMemoryMarket::new();
    market.add_speciality_tags("designer", &["design"]);
    for performer_id in 1..=6 {
        market.add_performer(performer_id, &["designer"]);
    }
    market.insert_order(OrderBuilder::new().with_id(1).team().with_tags(&["design"]).build());
    let services = Arc::new(TestServices::new(market));

    let handles: Vec<_> = (1..=6)
        .map(|performer_id| {
            let assignment = services.assignment.clone();
            tokio::spawn(async move { assignment.assign_performer(1, performer_id).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if let AssignmentResult::CreatedTeam { .. } = handle.await.unwrap().unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(services.market.team_count(), 1);
    let team_id = services.market.order(1).unwrap().performer_team_id.unwrap();
    assert_eq!(services.market.team(team_id).unwrap().members.len(), 6);
}

#[tokio::test]
async fn test_closed_team_rejects_new_members() {
    let services = TestServices::seeded();
    services.market.insert_team(
        TeamBuilder::new(9)
            .with_members(&[1])
            .with_lead(1)
            .build(),
    );
    services.market.insert_order(
        OrderBuilder::new()
            .with_id(3)
            .with_team(9)
            .with_tags(&["design"])
            .build(),
    );

    let err = services.assignment.assign_performer(3, 3).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderInaccessible { id: 3 }));
}

#[tokio::test]
async fn test_rejoining_open_team_is_not_an_error() {
    let services = TestServices::seeded();
    services
        .market
        .insert_team(TeamBuilder::new(4).with_members(&[1]).build());
    services.market.insert_order(
        OrderBuilder::new()
            .with_id(2)
            .with_team(4)
            .with_tags(&["design"])
            .build(),
    );

    let result = services.assignment.assign_performer(2, 1).await.unwrap();
    assert_eq!(result.outcome(), "joined_team");
    assert_eq!(services.market.team(4).unwrap().members, vec![1]);
}

#[tokio::test]
async fn test_dangling_team_reference_is_team_not_found() {
    let services = TestServices::seeded();
    services.market.insert_order(
        OrderBuilder::new()
            .with_id(2)
            .with_team(404)
            .with_tags(&["design"])
            .build(),
    );

    let err = services.assignment.assign_performer(2, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::TeamNotFound { id: 404 }));
}

#[tokio::test]
async fn test_blocked_order_is_hidden_and_unclaimable_until_cleared() {
    let services = TestServices::seeded();
    services
        .market
        .insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());

    services.lifecycle.block_order(1, None).await.unwrap();
    let blocked = services.market.order(1).unwrap();
    assert!(blocked.is_blocked);
    let until = blocked.blocked_until.unwrap();
    assert!(until > Utc::now() + chrono::Duration::days(29));

    let visible = services
        .eligibility
        .list_eligible_orders(1, Pagination::default())
        .await
        .unwrap();
    assert!(visible.is_empty());
    let err = services.assignment.assign_performer(1, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderInaccessible { id: 1 }));

    let report = services
        .lifecycle
        .auto_unblock_sweep(until + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(report.orders, 1);

    services.assignment.assign_performer(1, 1).await.unwrap();
}

#[tokio::test]
async fn test_missing_order_and_performer() {
    let services = TestServices::seeded();

    let err = services.assignment.assign_performer(999, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderNotFound { id: 999 }));
    let err = services.assignment.assign_performer(999, 404).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderNotFound { id: 999 }));

    services
        .market
        .insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());
    let err = services.assignment.assign_performer(1, 999).await.unwrap_err();
    assert!(matches!(err, MarketError::PerformerNotFound { id: 999 }));

    services.market.block_user(3, None);
    let err = services.assignment.assign_performer(1, 3).await.unwrap_err();
    assert!(matches!(err, MarketError::PerformerBlocked { id: 3 }));
    let err = services.assignment.assign_performer(999, 3).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderNotFound { id: 999 }));
}

#[tokio::test]
async fn test_held_row_lock_surfaces_contention() {
    let market = InMemoryMarket::new().with_lock_timeout(Duration::from_millis(50));
    market.add_speciality_tags("designer", &["design"]);
    market.add_performer(1, &["designer"]);
    market.insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());
    let services = TestServices::new(market.clone());

    let held = market.begin_claim(1).await.unwrap().unwrap();
    let err = services.assignment.assign_performer(1, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::Contention(_)));
    assert!(err.is_retryable());

    drop(held);
    services.assignment.assign_performer(1, 1).await.unwrap();
}

#[tokio::test]
async fn test_dropped_claim_rolls_back() {
    let market = InMemoryMarket::new();
    market.insert_order(OrderBuilder::new().with_id(1).team().with_tags(&["design"]).build());

    {
        let mut tx = market.begin_claim(1).await.unwrap().unwrap();
        let team = tx.create_team("Hyper_Coders_001").await.unwrap();
        tx.add_team_member(team.id, 1).await.unwrap();
    }

    let order = market.order(1).unwrap();
    assert!(order.performer_team_id.is_none());
    assert_eq!(market.team_count(), 0);
}

#[tokio::test]
async fn test_retry_after_commit_keeps_single_claim_result() {
    let services = TestServices::seeded();
    services
        .market
        .insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());
    let assignment = flaky_assignment(&services, 1);

    let result = assignment
        .assign_performer_with_retry(1, 1, &fast_retry())
        .await
        .unwrap();
    match &result {
        AssignmentResult::AssignedSingle { order, performer } => {
            assert_eq!(order.performer_id, Some(1));
            assert_eq!(performer.username, "performer1");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(services.market.order(1).unwrap().performer_id, Some(1));
}

#[tokio::test]
async fn test_failure_after_commit_is_not_retried_as_new_claim() {
    let services = TestServices::seeded();
    services
        .market
        .insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());
    let assignment = flaky_assignment(&services, usize::MAX);

    let err = assignment
        .assign_performer_with_retry(1, 1, &fast_retry())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Internal(_)), "{err:?}");
    assert!(!err.is_retryable());
    assert_eq!(services.market.order(1).unwrap().performer_id, Some(1));

    let err = assignment.assign_performer(1, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::AlreadyAssigned { .. }));
}

#[tokio::test]
async fn test_retrying_team_claim_creates_one_team() {
    let services = TestServices::seeded();
    services.market.insert_order(
        OrderBuilder::new()
            .with_id(1)
            .team()
            .with_tags(&["design"])
            .build(),
    );

    let result = services
        .assignment
        .assign_performer_with_retry(1, 3, &fast_retry())
        .await
        .unwrap();
    assert_eq!(result.outcome(), "created_team");
    assert_eq!(services.market.team_count(), 1);
}
