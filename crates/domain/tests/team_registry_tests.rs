use gigmarket_domain::{MarketError, Pagination};
use gigmarket_testing_utils::{OrderBuilder, TeamBuilder, TestServices};

#[tokio::test]
async fn test_roster_keeps_join_order_and_lead() {
    let services = TestServices::seeded();
    services
        .market
        .insert_team(TeamBuilder::new(1).with_members(&[3, 1, 2]).with_lead(1).build());

    let roster = services.teams.get_team_with_members(1).await.unwrap();
    let ids: Vec<i64> = roster.performers.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![3, 1, 2]);
    assert_eq!(roster.lead.unwrap().username, "performer1");
}

#[tokio::test]
async fn test_missing_team_is_team_not_found() {
    let services = TestServices::seeded();
    let err = services.teams.get_team_with_members(77).await.unwrap_err();
    assert!(matches!(err, MarketError::TeamNotFound { id: 77 }));
}

#[tokio::test]
async fn test_assign_lead_closes_team() {
    let services = TestServices::seeded();
    services.market.insert_order(
        OrderBuilder::new()
            .with_id(1)
            .team()
            .with_tags(&["design"])
            .build(),
    );
    services.assignment.assign_performer(1, 1).await.unwrap();
    let team_id = services.market.order(1).unwrap().performer_team_id.unwrap();

    let err = services
        .teams
        .assign_team_lead(team_id, 999, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotTeamOwner { .. }));

    let err = services
        .teams
        .assign_team_lead(team_id, 100, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotTeamMember { performer_id: 3, .. }));

    let roster = services.teams.assign_team_lead(team_id, 100, 1).await.unwrap();
    assert_eq!(roster.lead.map(|p| p.id), Some(1));

    let err = services
        .teams
        .assign_team_lead(team_id, 100, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::TeamLeadAlreadySet { .. }));

    let err = services.assignment.assign_performer(1, 3).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderInaccessible { id: 1 }));
}

#[tokio::test]
async fn test_eligible_orders_are_sorted_and_paginated() {
    let services = TestServices::seeded();
    for id in [5, 2, 9, 4] {
        services
            .market
            .insert_order(OrderBuilder::new().with_id(id).with_tags(&["marketing"]).build());
    }
    services
        .market
        .insert_order(OrderBuilder::new().with_id(3).with_tags(&["writing"]).build());

    let all = services
        .eligibility
        .list_eligible_orders(1, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.iter().map(|o| o.id).collect::<Vec<_>>(), vec![2, 4, 5, 9]);

    let page = services
        .eligibility
        .list_eligible_orders(
            1,
            Pagination {
                limit: Some(2),
                offset: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.iter().map(|o| o.id).collect::<Vec<_>>(), vec![4, 5]);
}

#[tokio::test]
async fn test_performer_without_tags_sees_nothing() {
    let services = TestServices::seeded();
    services.market.add_performer(50, &["unknown-speciality"]);
    services
        .market
        .insert_order(OrderBuilder::new().with_id(1).with_tags(&["design"]).build());

    let orders = services
        .eligibility
        .list_eligible_orders(50, Pagination::default())
        .await
        .unwrap();
    assert!(orders.is_empty());
}
