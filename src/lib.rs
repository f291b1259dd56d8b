pub mod app;
pub mod attendance;
pub mod auth;
pub mod common;
pub mod config;
pub mod equipment;
pub mod error;
pub mod members;
pub mod memberships;
pub mod payments;
pub mod plans;
pub mod state;
pub mod trainers;
