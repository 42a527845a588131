//! Progress repository — the append-only `scraping_progress` checkpoints.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use super::parse_datetime;
use crate::domain::ProgressRecord;

pub struct ProgressRepository {
    pool: SqlitePool,
}

impl ProgressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        job_id: &str,
        domain: &str,
        city: &str,
        page: i64,
        businesses_found: i64,
        new_businesses: i64,
        businesses_scraped: i64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query!(
            r#"
            INSERT INTO scraping_progress (
                job_id, domain, city, page, businesses_found, new_businesses,
                businesses_scraped, timestamp
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            job_id,
            domain,
            city,
            page,
            businesses_found,
            new_businesses,
            businesses_scraped,
            now,
        )
        .execute(&self.pool)
        .await
        .context("failed to insert progress record")?;

        tracing::debug!(job_id, city, page, "checkpoint written");
        Ok(())
    }

    /// Latest checkpoint for a job, ordered by timestamp desc — used to
    /// locate the resume cursor (step 1 of the supervisor algorithm).
    pub async fn latest_for_job(&self, job_id: &str) -> Result<Option<ProgressRecord>> {
        let row = sqlx::query!(
            r#"
            SELECT id, job_id, domain, city, page, businesses_found, new_businesses,
                businesses_scraped, timestamp
            FROM scraping_progress
            WHERE job_id = ?1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
            job_id
        )
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch latest progress record")?;

        Ok(row.map(|row| ProgressRecord {
            id: row.id,
            job_id: row.job_id,
            domain: row.domain,
            city: row.city,
            page: row.page,
            businesses_found: row.businesses_found,
            new_businesses: row.new_businesses,
            businesses_scraped: row.businesses_scraped,
            timestamp: parse_datetime(&row.timestamp),
        }))
    }

    pub async fn list_for_job(&self, job_id: &str) -> Result<Vec<ProgressRecord>> {
        let rows = sqlx::query!(
            r#"
            SELECT id, job_id, domain, city, page, businesses_found, new_businesses,
                businesses_scraped, timestamp
            FROM scraping_progress
            WHERE job_id = ?1
            ORDER BY timestamp ASC
            "#,
            job_id
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list progress records")?;

        Ok(rows
            .into_iter()
            .map(|row| ProgressRecord {
                id: row.id,
                job_id: row.job_id,
                domain: row.domain,
                city: row.city,
                page: row.page,
                businesses_found: row.businesses_found,
                new_businesses: row.new_businesses,
                businesses_scraped: row.businesses_scraped,
                timestamp: parse_datetime(&row.timestamp),
            })
            .collect())
    }
}
