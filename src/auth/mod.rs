use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod roles;
pub mod services;

pub use extractors::{AuthUser, CurrentUser};
pub use roles::Role;

pub fn router() -> Router<AppState> {
    Router::new().nest("/auth", handlers::auth_routes())
}
