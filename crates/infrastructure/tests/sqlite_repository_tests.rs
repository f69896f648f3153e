mod common;

use std::str::FromStr;

use chrono::{Duration, Utc};
use common::{count, execute, sqlite_manager, DbServices};
use gigmarket_domain::{
    AssignmentResult, ClaimTransaction, MarketError, OrderUpdate, Pagination, PriceDirection,
};
use gigmarket_testing_utils::NewOrderBuilder;
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn seeded(lock_timeout_ms: u64) -> (tempfile::TempDir, DbServices) {
    let (dir, manager) = sqlite_manager(lock_timeout_ms).await;
    (dir, DbServices::seeded(manager).await)
}

#[tokio::test]
async fn test_create_order_persists_tags_images_and_price() {
    let (_dir, services) = seeded(2000).await;

    let created = services
        .lifecycle
        .create_order(
            100,
            NewOrderBuilder::new("Landing page")
                .with_description("one page")
                .with_tags(&["design", "branding", "design"])
                .with_images(&["main.png", "second.png"])
                .with_price(dec("49.999"))
                .build(),
        )
        .await
        .unwrap();

    let loaded = services.lifecycle.get_order(created.id).await.unwrap();
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.description.as_deref(), Some("one page"));
    assert_eq!(loaded.price, dec("50.00"));
    assert_eq!(
        loaded.tags.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["branding", "design"]
    );
    assert_eq!(loaded.main_image(), Some("main.png"));
    assert_eq!(loaded.images.len(), 2);

    let tag_rows = count(
        services.manager.pool(),
        "SELECT COUNT(*) FROM tags WHERE name = 'branding'",
    )
    .await;
    assert_eq!(tag_rows, 1);
}

#[tokio::test]
async fn test_end_to_end_single_order_scenario() {
    let (_dir, services) = seeded(2000).await;
    let order = services
        .lifecycle
        .create_order(100, NewOrderBuilder::new("O1").with_tags(&["design"]).build())
        .await
        .unwrap();

    let p1 = services
        .eligibility
        .list_eligible_orders(1, Pagination::default())
        .await
        .unwrap();
    assert_eq!(p1.iter().map(|o| o.id).collect::<Vec<_>>(), vec![order.id]);
    let p2 = services
        .eligibility
        .list_eligible_orders(2, Pagination::default())
        .await
        .unwrap();
    assert!(p2.is_empty());

    let err = services
        .assignment
        .assign_performer(order.id, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::OrderInaccessible { .. }));

    match services.assignment.assign_performer(order.id, 1).await.unwrap() {
        AssignmentResult::AssignedSingle { order, performer } => {
            assert_eq!(order.performer_id, Some(1));
            assert_eq!(performer.username, "performer1");
            assert_eq!(performer.first_name.as_deref(), Some("Anna"));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let err = services
        .assignment
        .assign_performer(order.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::AlreadyAssigned { performer_id: 1, .. }));
    let err = services
        .assignment
        .assign_performer(order.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::AlreadyTaken { .. }));

    let assigned = services.lifecycle.list_assigned_orders(1).await.unwrap();
    assert_eq!(assigned.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_single_claims_have_one_winner() {
    let (_dir, services) = seeded(5000).await;
    for id in 10..18 {
        execute(
            services.manager.pool(),
            &format!("INSERT INTO users (id, username, is_blocked) VALUES ({id}, 'designer{id}', FALSE)"),
        )
        .await;
        execute(
            services.manager.pool(),
            &format!("INSERT INTO users_specialities (user_id, speciality_id) SELECT {id}, id FROM specialities WHERE name = 'designer'"),
        )
        .await;
    }
    let order = services
        .lifecycle
        .create_order(100, NewOrderBuilder::new("race").with_tags(&["design"]).build())
        .await
        .unwrap();

    let handles: Vec<_> = (10..18)
        .map(|performer_id| {
            let assignment = services.assignment.clone();
            tokio::spawn(async move { assignment.assign_performer(order.id, performer_id).await })
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
    assert_eq!(taken, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_team_claims_create_single_team() {
    let (_dir, services) = seeded(5000).await;
    let order = services
        .lifecycle
        .create_order(
            100,
            NewOrderBuilder::new("team race")
                .team()
                .with_tags(&["design", "writing"])
                .build(),
        )
        .await
        .unwrap();

    let handles: Vec<_> = [1, 2, 3]
        .into_iter()
        .map(|performer_id| {
            let assignment = services.assignment.clone();
            tokio::spawn(async move { assignment.assign_performer(order.id, performer_id).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if let AssignmentResult::CreatedTeam { .. } = handle.await.unwrap().unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    let teams = count(services.manager.pool(), "SELECT COUNT(*) FROM teams").await;
    assert_eq!(teams, 1);
    let team_id = services
        .lifecycle
        .get_order(order.id)
        .await
        .unwrap()
        .performer_team_id
        .unwrap();
    let roster = services.teams.get_team_with_members(team_id).await.unwrap();
    assert_eq!(roster.performers.len(), 3);
    assert!(roster.lead.is_none());
}

#[tokio::test]
async fn test_team_growth_and_lead_assignment() {
    let (_dir, services) = seeded(2000).await;
    let order = services
        .lifecycle
        .create_order(
            100,
            NewOrderBuilder::new("O7")
                .team()
                .with_tags(&["design", "writing"])
                .build(),
        )
        .await
        .unwrap();

    let team_id = match services.assignment.assign_performer(order.id, 3).await.unwrap() {
        AssignmentResult::CreatedTeam { team, .. } => {
            assert_eq!(team.name.split('_').count(), 3);
            team.id
        }
        other => panic!("unexpected result: {other:?}"),
    };
    let joined = services.assignment.assign_performer(order.id, 2).await.unwrap();
    assert_eq!(joined.outcome(), "joined_team");
    let rejoined = services.assignment.assign_performer(order.id, 2).await.unwrap();
    assert_eq!(rejoined.outcome(), "joined_team");

    let roster = services.teams.get_team_with_members(team_id).await.unwrap();
    let ids: Vec<i64> = roster.performers.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![3, 2]);

    let roster = services
        .teams
        .assign_team_lead(team_id, 100, 2)
        .await
        .unwrap();
    assert_eq!(roster.lead.map(|p| p.username), Some("performer2".to_string()));

    let err = services
        .assignment
        .assign_performer(order.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::OrderInaccessible { .. }));

    let assigned = services.lifecycle.list_assigned_orders(2).await.unwrap();
    assert_eq!(assigned.iter().map(|o| o.id).collect::<Vec<_>>(), vec![order.id]);
}

#[tokio::test]
async fn test_held_claim_surfaces_contention() {
    let (_dir, services) = seeded(100).await;
    let order = services
        .lifecycle
        .create_order(100, NewOrderBuilder::new("locked").with_tags(&["design"]).build())
        .await
        .unwrap();

    let orders = services.manager.order_repository();
    let held = orders.begin_claim(order.id).await.unwrap().unwrap();

    let err = services
        .assignment
        .assign_performer(order.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Contention(_)), "got {err:?}");
    assert!(err.is_retryable());

    drop(held);
    services.assignment.assign_performer(order.id, 1).await.unwrap();
}

#[tokio::test]
async fn test_dropped_claim_rolls_back() {
    let (_dir, services) = seeded(2000).await;
    let order = services
        .lifecycle
        .create_order(100, NewOrderBuilder::new("rollback").team().build())
        .await
        .unwrap();

    let orders = services.manager.order_repository();
    {
        let mut tx = orders.begin_claim(order.id).await.unwrap().unwrap();
        let team = tx.create_team("Elite_Designers_0AB").await.unwrap();
        assert!(tx.add_team_member(team.id, 1).await.unwrap());
    }

    let reloaded = services.lifecycle.get_order(order.id).await.unwrap();
    assert!(reloaded.performer_team_id.is_none());
    assert_eq!(count(services.manager.pool(), "SELECT COUNT(*) FROM teams").await, 0);

    assert!(orders.begin_claim(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_block_sweep_and_price_adjustment() {
    let (_dir, services) = seeded(2000).await;
    let order = services
        .lifecycle
        .create_order(100, NewOrderBuilder::new("blocked").with_tags(&["design"]).build())
        .await
        .unwrap();

    let past = Utc::now() - Duration::hours(1);
    services.lifecycle.block_order(order.id, Some(past)).await.unwrap();
    assert!(services
        .eligibility
        .list_eligible_orders(1, Pagination::default())
        .await
        .unwrap()
        .is_empty());
    execute(
        services.manager.pool(),
        &format!(
            "UPDATE users SET is_blocked = TRUE, block_expired = '{}' WHERE id = 2",
            (Utc::now() - Duration::days(1)).format("%F %T%.f%:z")
        ),
    )
    .await;

    let first = services.lifecycle.auto_unblock_sweep(Utc::now()).await.unwrap();
    assert_eq!((first.orders, first.users), (1, 1));
    let second = services.lifecycle.auto_unblock_sweep(Utc::now()).await.unwrap();
    assert!(second.is_empty());

    let err = services
        .lifecycle
        .adjust_price(order.id, None, 15, PriceDirection::Increase)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidPercentage { percent: 15 }));

    let adjusted = services
        .lifecycle
        .adjust_price(order.id, Some(100), 20, PriceDirection::Increase)
        .await
        .unwrap();
    assert_eq!(adjusted.price, dec("120.00"));
    assert_eq!(
        services.lifecycle.get_order(order.id).await.unwrap().price,
        dec("120.00")
    );

    let updated = services
        .lifecycle
        .update_order(
            order.id,
            100,
            OrderUpdate {
                tags: Some(vec!["writing".to_string()]),
                images: Some(vec!["new.png".to_string()]),
                ..OrderUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        updated.tags.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["writing"]
    );
    assert_eq!(updated.images, vec!["new.png".to_string()]);
    assert_eq!(updated.price, dec("120.00"));

    let events = services.audit.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].percent, Some(20));

    services.lifecycle.delete_order(order.id, Some(100)).await.unwrap();
    assert_eq!(
        count(services.manager.pool(), "SELECT COUNT(*) FROM orders_tags").await,
        0
    );
}

#[tokio::test]
async fn test_audit_log_repository_writes_rows() {
    let (_dir, services) = seeded(2000).await;
    let order = services
        .lifecycle
        .create_order(100, NewOrderBuilder::new("audited").with_tags(&["design"]).build())
        .await
        .unwrap();

    let repository = services.manager.audit_log_repository();
    for event in services.audit.events() {
        repository.insert(&event).await.unwrap();
    }

    let rows = count(
        services.manager.pool(),
        &format!(
            "SELECT COUNT(*) FROM orders_logs WHERE order_id = {} AND change_type = 'created' AND new_price = '100.00'",
            order.id
        ),
    )
    .await;
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_unknown_entities() {
    let (_dir, services) = seeded(2000).await;
    let users = services.manager.user_directory();
    assert!(users.find_performer(404).await.unwrap().is_none());
    let profiles = users.find_profiles(&[3, 404, 1]).await.unwrap();
    assert_eq!(profiles.iter().map(|p| p.id).collect::<Vec<_>>(), vec![3, 1]);

    let err = services.teams.get_team_with_members(404).await.unwrap_err();
    assert!(matches!(err, MarketError::TeamNotFound { id: 404 }));

    let index = services.manager.speciality_catalog().load_index().await.unwrap();
    assert_eq!(index.specialities().len(), 3);

}
