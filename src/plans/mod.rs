pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::{Extension, Router};
use services::PlanKind;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/api/workout-plans",
            handlers::plan_routes().layer(Extension(PlanKind::Workout)),
        )
        .nest(
            "/api/diet-plans",
            handlers::plan_routes().layer(Extension(PlanKind::Diet)),
        )
}
