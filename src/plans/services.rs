use std::collections::BTreeSet;

use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo;
use crate::{
    common::parse_id,
    error::{AppError, AppResult},
    members::repo as member_repo,
};

/// Which catalog a request works on. Table and column names come from here
/// only, so they are safe to splice into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Workout,
    Diet,
}

const WORKOUT_TYPES: [&str; 12] = [
    "balance",
    "cardio",
    "core",
    "endurance",
    "flexibility",
    "functional",
    "hiit",
    "mobility",
    "plyometric",
    "power",
    "rehabilitation",
    "strength",
];

const DIET_TYPES: [&str; 9] = [
    "Athletic Performance",
    "High Protein",
    "Keto",
    "Low Carb",
    "Maintenance",
    "Muscle Gain",
    "Vegan",
    "Vegetarian",
    "Weight Loss",
];

impl PlanKind {
    pub fn table(self) -> &'static str {
        match self {
            PlanKind::Workout => "workout_plans",
            PlanKind::Diet => "diet_plans",
        }
    }

    /// Member assignment table.
    pub fn link_table(self) -> &'static str {
        match self {
            PlanKind::Workout => "member_workout_plans",
            PlanKind::Diet => "member_diet_plans",
        }
    }

    /// Plan column of [`Self::link_table`].
    pub fn link_column(self) -> &'static str {
        match self {
            PlanKind::Workout => "workout_id",
            PlanKind::Diet => "diet_id",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlanKind::Workout => "Workout plan",
            PlanKind::Diet => "Diet plan",
        }
    }

    /// JSON key for one plan; lists use the plural.
    pub fn key(self) -> &'static str {
        match self {
            PlanKind::Workout => "workout_plan",
            PlanKind::Diet => "diet_plan",
        }
    }

    pub fn plural_key(self) -> &'static str {
        match self {
            PlanKind::Workout => "workout_plans",
            PlanKind::Diet => "diet_plans",
        }
    }

    pub fn default_types(self) -> &'static [&'static str] {
        match self {
            PlanKind::Workout => &WORKOUT_TYPES,
            PlanKind::Diet => &DIET_TYPES,
        }
    }
}

/// Parses raw ids, dropping duplicates but keeping first-seen order.
pub fn parse_ids(raw: &[String], what: &str) -> AppResult<Vec<Uuid>> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        let id = parse_id(value, what)?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Stored types merged with the defaults, sorted and unique.
pub fn merge_types(kind: PlanKind, stored: Vec<String>) -> Vec<String> {
    stored
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .chain(kind.default_types().iter().map(|t| t.to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Replaces every plan of `kind` assigned to a member with `plan_ids`.
pub async fn replace_plans_for_member(
    conn: &mut PgConnection,
    kind: PlanKind,
    member_id: Uuid,
    plan_ids: &[Uuid],
) -> AppResult<()> {
    let found = repo::existing_ids(&mut *conn, kind, plan_ids).await?;
    if let Some(missing) = plan_ids.iter().find(|id| !found.contains(id)) {
        warn!(%member_id, plan_id = %missing, "assignment references unknown plan");
        return Err(AppError::not_found(format!("{} not found: {missing}", kind.label())));
    }

    repo::clear_member_links(&mut *conn, kind, member_id).await?;
    repo::link_plans_to_member(&mut *conn, kind, member_id, plan_ids).await?;
    info!(%member_id, count = plan_ids.len(), kind = kind.key(), "member plans replaced");
    Ok(())
}

/// Replaces the member set of one plan with `member_ids`.
pub async fn replace_members_for_plan(
    conn: &mut PgConnection,
    kind: PlanKind,
    plan_id: Uuid,
    member_ids: &[Uuid],
) -> AppResult<()> {
    let found = member_repo::existing_ids(&mut *conn, member_ids).await?;
    if let Some(missing) = member_ids.iter().find(|id| !found.contains(id)) {
        warn!(%plan_id, member_id = %missing, "assignment references unknown member");
        return Err(AppError::not_found(format!("Member not found: {missing}")));
    }

    repo::clear_plan_links(&mut *conn, kind, plan_id).await?;
    repo::link_members_to_plan(&mut *conn, kind, plan_id, member_ids).await?;
    info!(%plan_id, count = member_ids.len(), kind = kind.key(), "plan members replaced");
    Ok(())
}

pub async fn replace_equipment_for_workout(
    conn: &mut PgConnection,
    workout_id: Uuid,
    equipment_ids: &[Uuid],
) -> AppResult<()> {
    let found = repo::existing_equipment_ids(&mut *conn, equipment_ids).await?;
    if let Some(missing) = equipment_ids.iter().find(|id| !found.contains(id)) {
        return Err(AppError::not_found(format!("Equipment not found: {missing}")));
    }
    repo::replace_workout_equipment(&mut *conn, workout_id, equipment_ids).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_their_tables() {
        assert_eq!(PlanKind::Workout.table(), "workout_plans");
        assert_eq!(PlanKind::Diet.link_table(), "member_diet_plans");
        assert_eq!(PlanKind::Diet.link_column(), "diet_id");
        assert_eq!(PlanKind::Workout.plural_key(), "workout_plans");
    }

    #[test]
    fn parse_ids_dedupes_and_rejects_garbage() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_ids(&[a.to_string(), b.to_string(), a.to_string()], "plan").unwrap();
        assert_eq!(ids, vec![a, b]);

        let err = parse_ids(&["nope".into()], "plan").unwrap_err();
        assert_eq!(err.to_string(), "Invalid plan ID format");
    }

    #[test]
    fn merge_types_keeps_defaults() {
        let merged = merge_types(PlanKind::Diet, vec![" Paleo ".into(), "Keto".into(), "".into()]);
        assert!(merged.contains(&"Paleo".to_string()));
        assert_eq!(merged.iter().filter(|t| *t == "Keto").count(), 1);
        assert!(merged.windows(2).all(|w| w[0] < w[1]));
    }
}
