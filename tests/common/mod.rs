//! Shared setup for tests that need a real Postgres.

use std::sync::Arc;

use gymdesk::{
    auth::{jwt::JwtKeys, repo_types::User, Role},
    config::{AppConfig, JwtConfig},
    members::repo::{self as member_repo, NewMember},
    state::AppState,
    trainers::repo::{self as trainer_repo, NewTrainer},
};
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use uuid::Uuid;

pub fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Returns early from the test when no database is configured.
#[macro_export]
macro_rules! require_database {
    () => {
        match crate::common::database_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping: TEST_DATABASE_URL not set");
                return;
            }
        }
    };
}

pub async fn pool(url: &str) -> PgPool {
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    pool
}

#[allow(dead_code)]
pub fn state(pool: PgPool) -> AppState {
    let config = AppConfig {
        database_url: String::new(),
        database_max_connections: 4,
        jwt: JwtConfig {
            secret: "integration".into(),
            issuer: "gymdesk".into(),
            audience: "gymdesk-users".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        maintenance_window_days: 7,
        cors_origins: Vec::new(),
        allow_admin_signup: false,
    };
    AppState::from_parts(pool, Arc::new(config))
}

#[allow(dead_code)]
pub fn bearer(state: &AppState, user_id: Uuid, role: Role) -> String {
    let token = JwtKeys::from_config(&state.config.jwt)
        .sign_access(user_id, role, "test@gym.test")
        .expect("sign token");
    format!("Bearer {token}")
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@gym.test", Uuid::new_v4().simple())
}

#[allow(dead_code)]
pub async fn seed_user(conn: &mut PgConnection, role: Role) -> Uuid {
    User::create(conn, &unique_email(role.db_name()), "not-a-real-hash", role)
        .await
        .expect("create user")
}

/// Returns `(user_id, member_id)`.
#[allow(dead_code)]
pub async fn seed_member(conn: &mut PgConnection) -> (Uuid, Uuid) {
    let user_id = seed_user(&mut *conn, Role::Member).await;
    let member_id = member_repo::insert_member(
        &mut *conn,
        &NewMember {
            user_id,
            first_name: Some("Test".into()),
            last_name: Some("Member".into()),
            dob: None,
            gender: None,
            emergency_contact: None,
        },
    )
    .await
    .expect("create member");
    (user_id, member_id)
}

#[allow(dead_code)]
pub async fn seed_trainer(conn: &mut PgConnection) -> Uuid {
    trainer_repo::insert_trainer(
        conn,
        &NewTrainer {
            first_name: Some("Test".into()),
            last_name: Some("Trainer".into()),
            ..NewTrainer::default()
        },
    )
    .await
    .expect("create trainer")
}

#[allow(dead_code)]
pub async fn email_exists(conn: &mut PgConnection, email: &str) -> bool {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(conn)
        .await
        .expect("query users")
}

#[allow(dead_code)]
pub fn unique_test_email(prefix: &str) -> String {
    unique_email(prefix)
}
