use gymdesk::{
    error::AppError,
    plans::{
        repo as plan_repo,
        repo_types::PlanFields,
        services::{replace_plans_for_member, PlanKind},
    },
};
use std::collections::HashSet;
use uuid::Uuid;

#[macro_use]
mod common;

fn fields(name: &str) -> PlanFields {
    PlanFields {
        name: name.into(),
        plan_type: Some("Strength".into()),
        description: None,
        kcal_count: None,
    }
}

#[tokio::test]
async fn assignment_replaces_the_whole_set() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let mut conn = pool.acquire().await.unwrap();

    let trainer = common::seed_trainer(&mut conn).await;
    let (_, member_id) = common::seed_member(&mut conn).await;
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        ids.push(
            plan_repo::insert(&mut conn, PlanKind::Workout, &fields(name), trainer)
                .await
                .unwrap(),
        );
    }

    replace_plans_for_member(&mut conn, PlanKind::Workout, member_id, &ids[..2])
        .await
        .unwrap();
    replace_plans_for_member(&mut conn, PlanKind::Workout, member_id, &ids[2..])
        .await
        .unwrap();

    let assigned: HashSet<Uuid> = plan_repo::plans_for_member(&mut conn, PlanKind::Workout, member_id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(assigned, HashSet::from([ids[2]]));
}

#[tokio::test]
async fn unknown_plan_id_keeps_previous_assignment() {
    let url = require_database!();
    let pool = common::pool(&url).await;
    let mut conn = pool.acquire().await.unwrap();

    let trainer = common::seed_trainer(&mut conn).await;
    let (_, member_id) = common::seed_member(&mut conn).await;
    let plan = plan_repo::insert(&mut conn, PlanKind::Diet, &fields("Lean"), trainer)
        .await
        .unwrap();
    replace_plans_for_member(&mut conn, PlanKind::Diet, member_id, &[plan])
        .await
        .unwrap();

    let err = replace_plans_for_member(&mut conn, PlanKind::Diet, member_id, &[Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let assigned = plan_repo::plans_for_member(&mut conn, PlanKind::Diet, member_id)
        .await
        .unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].id, plan);
}
