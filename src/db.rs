use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

use crate::store::Store;
use crate::store::memory::MemoryStore;
use crate::store::mysql::MySqlStore;

pub const MEMORY_URL: &str = "memory://";

/// Connects to the configured backend and brings its schema up to date.
pub async fn init_store(database_url: &str) -> Result<Arc<dyn Store>> {
    if database_url.starts_with(MEMORY_URL) {
        info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    info!("Database ready");
    Ok(Arc::new(MySqlStore::new(pool)))
}
