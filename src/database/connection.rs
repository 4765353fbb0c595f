use crate::config::DatabaseSettings;
use crate::database::store::StoreError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub type DbPool = PgPool;

pub async fn connect(settings: &DatabaseSettings) -> Result<DbPool, StoreError> {
    info!(
        max_connections = settings.max_connections,
        "Connecting to ledger database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
        .connect(&settings.url)
        .await?;

    Ok(pool)
}

pub async fn migrate(pool: &DbPool) -> Result<(), StoreError> {
    info!("Running ledger migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
