//! Job repository — the `scraping_jobs` table.
//!
//! Uses compile-time checked queries via `sqlx::query!`, following the
//! teacher's repository pattern. Status/pause_reason are stored as their
//! string form and mapped back through `FromStr` on read.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{map_job_status, map_pause_reason, parse_datetime, parse_datetime_opt};
use crate::domain::{
    Job, JobFilter, JobSort, JobStatus, Paging, PauseReason, SortField, SortOrder, StatusSummary,
};

pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, job: &Job) -> Result<()> {
        let errors_json = serde_json::to_string(&job.errors)?;
        let status = job.status.as_str();
        let pause_reason = job.pause_reason.map(|r| r.as_str());
        let created_at = job.created_at.to_rfc3339();

        sqlx::query!(
            r#"
            INSERT INTO scraping_jobs (
                id, name, domain, canonical_domain, status, concurrent_requests,
                request_delay, created_at, total_cities, cities_completed,
                total_businesses, businesses_scraped, current_page, pause_reason,
                errors, country, region, base_url, latitude, longitude, is_seeded
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, 0, 0, 1, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            job.id,
            job.name,
            job.domain,
            job.canonical_domain,
            status,
            job.concurrent_requests,
            job.request_delay,
            created_at,
            pause_reason,
            errors_json,
            job.country,
            job.region,
            job.base_url,
            job.latitude,
            job.longitude,
            job.is_seeded,
        )
        .execute(&self.pool)
        .await
        .context("failed to create job")?;

        tracing::info!(job_id = %job.id, domain = %job.canonical_domain, "job created");
        Ok(())
    }

    /// Returns the existing active job for `canonical_domain`, if any — used
    /// by admission to enforce I1 (domain exclusivity).
    pub async fn find_active_by_canonical_domain(
        &self,
        canonical_domain: &str,
    ) -> Result<Option<Job>> {
        let row = sqlx::query!(
            r#"
            SELECT id, name, domain, canonical_domain, status, concurrent_requests, request_delay,
                created_at, started_at, paused_at, resumed_at, completed_at,
                total_cities, cities_completed, total_businesses, businesses_scraped,
                current_domain, current_city, current_page, last_progress_timestamp,
                pause_reason, errors, country, region, base_url, latitude, longitude, is_seeded
            FROM scraping_jobs
            WHERE canonical_domain = ?1 AND status IN ('pending', 'running', 'paused')
            "#,
            canonical_domain
        )
        .fetch_optional(&self.pool)
        .await
        .context("failed to query active job by domain")?;

        Ok(row.map(|row| Job {
            id: row.id,
            name: row.name,
            domain: row.domain,
            canonical_domain: row.canonical_domain,
            status: map_job_status(&row.status),
            concurrent_requests: row.concurrent_requests,
            request_delay: row.request_delay,
            created_at: parse_datetime(&row.created_at),
            started_at: parse_datetime_opt(row.started_at.as_deref()),
            paused_at: parse_datetime_opt(row.paused_at.as_deref()),
            resumed_at: parse_datetime_opt(row.resumed_at.as_deref()),
            completed_at: parse_datetime_opt(row.completed_at.as_deref()),
            total_cities: row.total_cities,
            cities_completed: row.cities_completed,
            total_businesses: row.total_businesses,
            businesses_scraped: row.businesses_scraped,
            current_domain: row.current_domain,
            current_city: row.current_city,
            current_page: row.current_page,
            last_progress_timestamp: parse_datetime_opt(row.last_progress_timestamp.as_deref()),
            pause_reason: map_pause_reason(row.pause_reason.as_deref()),
            errors: serde_json::from_str(&row.errors).unwrap_or_default(),
            country: row.country,
            region: row.region,
            base_url: row.base_url,
            latitude: row.latitude,
            longitude: row.longitude,
            is_seeded: row.is_seeded != 0,
        }))
    }

    /// Status-agnostic lookup by canonical domain — unlike
    /// `find_active_by_canonical_domain`, this also finds terminal jobs, so
    /// catalog seeding can locate a prior job to delete on `overwrite`.
    pub async fn find_by_canonical_domain(&self, canonical_domain: &str) -> Result<Option<Job>> {
        let row = sqlx::query!(
            r#"
            SELECT id, name, domain, canonical_domain, status, concurrent_requests, request_delay,
                created_at, started_at, paused_at, resumed_at, completed_at,
                total_cities, cities_completed, total_businesses, businesses_scraped,
                current_domain, current_city, current_page, last_progress_timestamp,
                pause_reason, errors, country, region, base_url, latitude, longitude, is_seeded
            FROM scraping_jobs
            WHERE canonical_domain = ?1
            "#,
            canonical_domain
        )
        .fetch_optional(&self.pool)
        .await
        .context("failed to query job by canonical domain")?;

        Ok(row.map(|row| Job {
            id: row.id,
            name: row.name,
            domain: row.domain,
            canonical_domain: row.canonical_domain,
            status: map_job_status(&row.status),
            concurrent_requests: row.concurrent_requests,
            request_delay: row.request_delay,
            created_at: parse_datetime(&row.created_at),
            started_at: parse_datetime_opt(row.started_at.as_deref()),
            paused_at: parse_datetime_opt(row.paused_at.as_deref()),
            resumed_at: parse_datetime_opt(row.resumed_at.as_deref()),
            completed_at: parse_datetime_opt(row.completed_at.as_deref()),
            total_cities: row.total_cities,
            cities_completed: row.cities_completed,
            total_businesses: row.total_businesses,
            businesses_scraped: row.businesses_scraped,
            current_domain: row.current_domain,
            current_city: row.current_city,
            current_page: row.current_page,
            last_progress_timestamp: parse_datetime_opt(row.last_progress_timestamp.as_deref()),
            pause_reason: map_pause_reason(row.pause_reason.as_deref()),
            errors: serde_json::from_str(&row.errors).unwrap_or_default(),
            country: row.country,
            region: row.region,
            base_url: row.base_url,
            latitude: row.latitude,
            longitude: row.longitude,
            is_seeded: row.is_seeded != 0,
        }))
    }

    pub async fn get_by_id(&self, job_id: &str) -> Result<Job> {
        let row = sqlx::query!(
            r#"
            SELECT id, name, domain, canonical_domain, status, concurrent_requests, request_delay,
                created_at, started_at, paused_at, resumed_at, completed_at,
                total_cities, cities_completed, total_businesses, businesses_scraped,
                current_domain, current_city, current_page, last_progress_timestamp,
                pause_reason, errors, country, region, base_url, latitude, longitude, is_seeded
            FROM scraping_jobs
            WHERE id = ?1
            "#,
            job_id
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to fetch job")?;

        Ok(Job {
            id: row.id,
            name: row.name,
            domain: row.domain,
            canonical_domain: row.canonical_domain,
            status: map_job_status(&row.status),
            concurrent_requests: row.concurrent_requests,
            request_delay: row.request_delay,
            created_at: parse_datetime(&row.created_at),
            started_at: parse_datetime_opt(row.started_at.as_deref()),
            paused_at: parse_datetime_opt(row.paused_at.as_deref()),
            resumed_at: parse_datetime_opt(row.resumed_at.as_deref()),
            completed_at: parse_datetime_opt(row.completed_at.as_deref()),
            total_cities: row.total_cities,
            cities_completed: row.cities_completed,
            total_businesses: row.total_businesses,
            businesses_scraped: row.businesses_scraped,
            current_domain: row.current_domain,
            current_city: row.current_city,
            current_page: row.current_page,
            last_progress_timestamp: parse_datetime_opt(row.last_progress_timestamp.as_deref()),
            pause_reason: map_pause_reason(row.pause_reason.as_deref()),
            errors: serde_json::from_str(&row.errors).unwrap_or_default(),
            country: row.country,
            region: row.region,
            base_url: row.base_url,
            latitude: row.latitude,
            longitude: row.longitude,
            is_seeded: row.is_seeded != 0,
        })
    }

    pub async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let status_str = status.as_str();
        let rows = sqlx::query!(
            r#"
            SELECT id, name, domain, canonical_domain, status, concurrent_requests, request_delay,
                created_at, started_at, paused_at, resumed_at, completed_at,
                total_cities, cities_completed, total_businesses, businesses_scraped,
                current_domain, current_city, current_page, last_progress_timestamp,
                pause_reason, errors, country, region, base_url, latitude, longitude, is_seeded
            FROM scraping_jobs
            WHERE status = ?1
            ORDER BY created_at DESC
            "#,
            status_str
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list jobs by status")?;

        Ok(rows
            .into_iter()
            .map(|row| Job {
                id: row.id,
                name: row.name,
                domain: row.domain,
                canonical_domain: row.canonical_domain,
                status: map_job_status(&row.status),
                concurrent_requests: row.concurrent_requests,
                request_delay: row.request_delay,
                created_at: parse_datetime(&row.created_at),
                started_at: parse_datetime_opt(row.started_at.as_deref()),
                paused_at: parse_datetime_opt(row.paused_at.as_deref()),
                resumed_at: parse_datetime_opt(row.resumed_at.as_deref()),
                completed_at: parse_datetime_opt(row.completed_at.as_deref()),
                total_cities: row.total_cities,
                cities_completed: row.cities_completed,
                total_businesses: row.total_businesses,
                businesses_scraped: row.businesses_scraped,
                current_domain: row.current_domain,
                current_city: row.current_city,
                current_page: row.current_page,
                last_progress_timestamp: parse_datetime_opt(
                    row.last_progress_timestamp.as_deref(),
                ),
                pause_reason: map_pause_reason(row.pause_reason.as_deref()),
                errors: serde_json::from_str(&row.errors).unwrap_or_default(),
                country: row.country,
                region: row.region,
                base_url: row.base_url,
                latitude: row.latitude,
                longitude: row.longitude,
                is_seeded: row.is_seeded != 0,
            })
            .collect())
    }

    /// Generic filter/sort/page query backing `Scheduler::list_jobs` — the
    /// query shape is dynamic so this goes through `QueryBuilder` rather
    /// than `query!`, the same split `business_repository.rs` uses for
    /// `find_unexported`.
    pub async fn list_filtered(
        &self,
        filter: &JobFilter,
        paging: &Paging,
        sort: &JobSort,
    ) -> Result<Vec<Job>> {
        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT id, name, domain, canonical_domain, status, concurrent_requests, request_delay,
                created_at, started_at, paused_at, resumed_at, completed_at,
                total_cities, cities_completed, total_businesses, businesses_scraped,
                current_domain, current_city, current_page, last_progress_timestamp,
                pause_reason, errors, country, region, base_url, latitude, longitude, is_seeded
            FROM scraping_jobs WHERE 1=1
            "#,
        );
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(domain) = &filter.canonical_domain {
            qb.push(" AND canonical_domain = ").push_bind(domain.clone());
        }
        if let Some(is_seeded) = filter.is_seeded {
            qb.push(" AND is_seeded = ").push_bind(is_seeded);
        }

        let column = match sort.field {
            SortField::CreatedAt => "created_at",
            SortField::Status => "status",
            SortField::Domain => "canonical_domain",
        };
        let order = match sort.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(" ORDER BY {column} {order} LIMIT "))
            .push_bind(paging.limit)
            .push(" OFFSET ")
            .push_bind(paging.offset);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("failed to list filtered jobs")?;

        rows.into_iter().map(row_to_job).collect()
    }

    /// Per-status job counts for the operator dashboard.
    pub async fn status_summary(&self) -> Result<StatusSummary> {
        let rows = sqlx::query!("SELECT status, COUNT(*) as count FROM scraping_jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .context("failed to compute job status summary")?;

        let mut summary = StatusSummary::default();
        for row in rows {
            match map_job_status(&row.status) {
                JobStatus::Pending => summary.pending = row.count,
                JobStatus::Running => summary.running = row.count,
                JobStatus::Paused => summary.paused = row.count,
                JobStatus::Cancelled => summary.cancelled = row.count,
                JobStatus::Completed => summary.completed = row.count,
                JobStatus::Failed => summary.failed = row.count,
            }
        }
        Ok(summary)
    }

    pub async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        pause_reason: Option<PauseReason>,
    ) -> Result<()> {
        let status_str = status.as_str();
        let pause_reason_str = pause_reason.map(|r| r.as_str());
        let now = Utc::now().to_rfc3339();

        let started_at = matches!(status, JobStatus::Running).then(|| now.clone());
        let paused_at = matches!(status, JobStatus::Paused).then(|| now.clone());
        let resumed_at = None::<String>;
        let completed_at = status.is_terminal().then(|| now.clone());

        sqlx::query!(
            r#"
            UPDATE scraping_jobs
            SET status = ?1,
                pause_reason = ?2,
                started_at = COALESCE(?3, started_at),
                paused_at = COALESCE(?4, paused_at),
                resumed_at = COALESCE(?5, resumed_at),
                completed_at = COALESCE(?6, completed_at)
            WHERE id = ?7
            "#,
            status_str,
            pause_reason_str,
            started_at,
            paused_at,
            resumed_at,
            completed_at,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to set job status")?;

        tracing::info!(job_id, status = status_str, "job status changed");
        Ok(())
    }

    /// Stamp `resumed_at` and clear `pause_reason` — used by `resume`.
    pub async fn mark_resumed(&self, job_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query!(
            r#"
            UPDATE scraping_jobs
            SET status = 'running', pause_reason = NULL, resumed_at = ?1
            WHERE id = ?2
            "#,
            now,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to mark job resumed")?;
        Ok(())
    }

    pub async fn reset_for_force_start(&self, job_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query!(
            r#"
            UPDATE scraping_jobs
            SET status = 'running', pause_reason = NULL, started_at = ?1, completed_at = NULL
            WHERE id = ?2
            "#,
            now,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to reset job for force start")?;
        Ok(())
    }

    pub async fn reset_cursor_to_pending(&self, job_id: &str) -> Result<()> {
        sqlx::query!(
            r#"
            UPDATE scraping_jobs
            SET status = 'pending', pause_reason = NULL, current_city = NULL,
                current_page = 1, last_progress_timestamp = NULL, started_at = NULL,
                completed_at = NULL
            WHERE id = ?1
            "#,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to reset job cursor")?;
        Ok(())
    }

    pub async fn set_total_cities_if_zero(&self, job_id: &str, total_cities: i64) -> Result<()> {
        sqlx::query!(
            r#"
            UPDATE scraping_jobs
            SET total_cities = ?1
            WHERE id = ?2 AND total_cities = 0
            "#,
            total_cities,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to set total_cities")?;
        Ok(())
    }

    pub async fn increment_total_businesses(&self, job_id: &str, delta: i64) -> Result<()> {
        sqlx::query!(
            "UPDATE scraping_jobs SET total_businesses = total_businesses + ?1 WHERE id = ?2",
            delta,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to increment total_businesses")?;
        Ok(())
    }

    pub async fn increment_businesses_scraped(&self, job_id: &str, delta: i64) -> Result<()> {
        sqlx::query!(
            "UPDATE scraping_jobs SET businesses_scraped = businesses_scraped + ?1 WHERE id = ?2",
            delta,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to increment businesses_scraped")?;
        Ok(())
    }

    pub async fn increment_cities_completed(&self, job_id: &str) -> Result<()> {
        sqlx::query!(
            "UPDATE scraping_jobs SET cities_completed = cities_completed + 1 WHERE id = ?1",
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to increment cities_completed")?;
        Ok(())
    }

    pub async fn update_cursor(
        &self,
        job_id: &str,
        current_city: &str,
        current_page: i64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query!(
            r#"
            UPDATE scraping_jobs
            SET current_city = ?1, current_page = ?2, last_progress_timestamp = ?3
            WHERE id = ?4
            "#,
            current_city,
            current_page,
            now,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to update job cursor")?;
        Ok(())
    }

    pub async fn append_error(&self, job_id: &str, error: &str) -> Result<()> {
        let job = self.get_by_id(job_id).await?;
        let mut errors = job.errors;
        errors.push(error.to_string());
        let errors_json = serde_json::to_string(&errors)?;

        sqlx::query!(
            "UPDATE scraping_jobs SET errors = ?1 WHERE id = ?2",
            errors_json,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to append job error")?;

        tracing::warn!(job_id, error, "job error recorded");
        Ok(())
    }

    pub async fn update_settings(
        &self,
        job_id: &str,
        concurrent_requests: i64,
        request_delay: f64,
    ) -> Result<()> {
        sqlx::query!(
            r#"
            UPDATE scraping_jobs
            SET concurrent_requests = ?1, request_delay = ?2
            WHERE id = ?3
            "#,
            concurrent_requests,
            request_delay,
            job_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to update job settings")?;
        Ok(())
    }

    pub async fn delete(&self, job_id: &str) -> Result<()> {
        sqlx::query!("DELETE FROM scraping_jobs WHERE id = ?1", job_id)
            .execute(&self.pool)
            .await
            .context("failed to delete job")?;
        tracing::info!(job_id, "job deleted");
        Ok(())
    }
}

fn row_to_job(row: SqliteRow) -> Result<Job> {
    let status: String = row.try_get("status")?;
    let started_at: Option<String> = row.try_get("started_at")?;
    let paused_at: Option<String> = row.try_get("paused_at")?;
    let resumed_at: Option<String> = row.try_get("resumed_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    let created_at: String = row.try_get("created_at")?;
    let last_progress_timestamp: Option<String> = row.try_get("last_progress_timestamp")?;
    let pause_reason: Option<String> = row.try_get("pause_reason")?;
    let errors: String = row.try_get("errors")?;
    let is_seeded: i64 = row.try_get("is_seeded")?;

    Ok(Job {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        canonical_domain: row.try_get("canonical_domain")?,
        status: map_job_status(&status),
        concurrent_requests: row.try_get("concurrent_requests")?,
        request_delay: row.try_get("request_delay")?,
        created_at: parse_datetime(&created_at),
        started_at: parse_datetime_opt(started_at.as_deref()),
        paused_at: parse_datetime_opt(paused_at.as_deref()),
        resumed_at: parse_datetime_opt(resumed_at.as_deref()),
        completed_at: parse_datetime_opt(completed_at.as_deref()),
        total_cities: row.try_get("total_cities")?,
        cities_completed: row.try_get("cities_completed")?,
        total_businesses: row.try_get("total_businesses")?,
        businesses_scraped: row.try_get("businesses_scraped")?,
        current_domain: row.try_get("current_domain")?,
        current_city: row.try_get("current_city")?,
        current_page: row.try_get("current_page")?,
        last_progress_timestamp: parse_datetime_opt(last_progress_timestamp.as_deref()),
        pause_reason: map_pause_reason(pause_reason.as_deref()),
        errors: serde_json::from_str(&errors).unwrap_or_default(),
        country: row.try_get("country")?,
        region: row.try_get("region")?,
        base_url: row.try_get("base_url")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        is_seeded: is_seeded != 0,
    })
}
