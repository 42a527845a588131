//! Database connection and embedded migrations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

pub async fn init_db(database_path: &std::path::Path) -> Result<SqlitePool> {
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database dir: {}", parent.display()))?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", database_path.display());
    tracing::info!(url = %db_url, "connecting to database");

    let pool = SqlitePool::connect(&db_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", database_path.display()))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    tracing::info!("database initialized");
    Ok(pool)
}
