use crate::config::AppConfig;
use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        Ok(Self { db, config })
    }

    pub fn from_parts(db: PgPool, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// State with a lazily connecting pool; nothing touches the database
    /// until a query actually runs.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig::test_default());
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool ok");
        Self { db, config }
    }
}
