//! The Job Store: durable state for jobs, per-page progress, business
//! records, and export jobs/logs. Single source of truth for recovery.

pub mod sqlite;

use sqlx::SqlitePool;

use sqlite::{
    business_repository::BusinessRepository, export_repository::ExportRepository,
    job_repository::JobRepository, progress_repository::ProgressRepository,
};

/// Aggregates the per-aggregate repositories behind one handle so callers
/// that need a single `Store` don't have to thread four pools around.
#[derive(Clone)]
pub struct Store {
    pub jobs: std::sync::Arc<JobRepository>,
    pub progress: std::sync::Arc<ProgressRepository>,
    pub businesses: std::sync::Arc<BusinessRepository>,
    pub exports: std::sync::Arc<ExportRepository>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            jobs: std::sync::Arc::new(JobRepository::new(pool.clone())),
            progress: std::sync::Arc::new(ProgressRepository::new(pool.clone())),
            businesses: std::sync::Arc::new(BusinessRepository::new(pool.clone())),
            exports: std::sync::Arc::new(ExportRepository::new(pool)),
        }
    }
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to create in-memory test database");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("failed to run migrations");
    pool
}
