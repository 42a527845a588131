//! Export repository — `api_export_jobs` and `api_export_logs`.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use super::{map_export_status, parse_datetime, parse_datetime_opt};
use crate::domain::{ExportJob, ExportJobConfig, ExportLog, ExportStatus, RequestMethod};

pub struct ExportRepository {
    pool: SqlitePool,
}

impl ExportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, job: &ExportJob) -> Result<()> {
        let method = job.config.request_method.as_str();
        let fields = job.config.fields.as_ref().map(serde_json::to_string).transpose()?;
        let filters = job.config.filters.as_ref().map(serde_json::to_string).transpose()?;
        let status = job.status.as_str();
        let created_at = job.created_at.to_rfc3339();

        sqlx::query!(
            r#"
            INSERT INTO api_export_jobs (
                id, endpoint_url, auth_token, request_method, batch_size,
                rate_limit_delay, fields, filters, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            job.id,
            job.config.endpoint_url,
            job.config.auth_token,
            method,
            job.config.batch_size,
            job.config.rate_limit_delay,
            fields,
            filters,
            status,
            created_at,
        )
        .execute(&self.pool)
        .await
        .context("failed to create export job")?;

        tracing::info!(export_job_id = %job.id, "export job created");
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<ExportJob> {
        let row = sqlx::query!(
            r#"
            SELECT id, endpoint_url, auth_token, request_method, batch_size,
                rate_limit_delay, fields, filters, status, total_records,
                exported_records, failed_records, created_at, started_at,
                completed_at, error_message
            FROM api_export_jobs
            WHERE id = ?1
            "#,
            id
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to fetch export job")?;

        Ok(ExportJob {
            id: row.id,
            config: ExportJobConfig {
                endpoint_url: row.endpoint_url,
                auth_token: row.auth_token,
                request_method: row.request_method.parse().unwrap_or(RequestMethod::Post),
                batch_size: row.batch_size,
                rate_limit_delay: row.rate_limit_delay,
                fields: row.fields.and_then(|s| serde_json::from_str(&s).ok()),
                filters: row.filters.and_then(|s| serde_json::from_str(&s).ok()),
            },
            status: map_export_status(&row.status),
            total_records: row.total_records,
            exported_records: row.exported_records,
            failed_records: row.failed_records,
            created_at: parse_datetime(&row.created_at),
            started_at: parse_datetime_opt(row.started_at.as_deref()),
            completed_at: parse_datetime_opt(row.completed_at.as_deref()),
            error_message: row.error_message,
        })
    }

    pub async fn list_all(&self) -> Result<Vec<ExportJob>> {
        let rows = sqlx::query!(
            r#"SELECT id FROM api_export_jobs ORDER BY created_at DESC"#
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list export jobs")?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(self.get_by_id(&row.id).await?);
        }
        Ok(jobs)
    }

    pub async fn set_status(&self, id: &str, status: ExportStatus) -> Result<()> {
        let status_str = status.as_str();
        let now = Utc::now().to_rfc3339();
        let started_at = matches!(status, ExportStatus::Running).then(|| now.clone());
        let completed_at = status.is_terminal().then(|| now.clone());

        sqlx::query!(
            r#"
            UPDATE api_export_jobs
            SET status = ?1,
                started_at = COALESCE(?2, started_at),
                completed_at = COALESCE(?3, completed_at)
            WHERE id = ?4
            "#,
            status_str,
            started_at,
            completed_at,
            id,
        )
        .execute(&self.pool)
        .await
        .context("failed to set export job status")?;
        Ok(())
    }

    pub async fn set_error(&self, id: &str, message: &str) -> Result<()> {
        sqlx::query!(
            "UPDATE api_export_jobs SET status = 'failed', error_message = ?1 WHERE id = ?2",
            message,
            id,
        )
        .execute(&self.pool)
        .await
        .context("failed to set export job error")?;
        Ok(())
    }

    pub async fn set_total_records(&self, id: &str, total: i64) -> Result<()> {
        sqlx::query!(
            "UPDATE api_export_jobs SET total_records = ?1 WHERE id = ?2",
            total,
            id,
        )
        .execute(&self.pool)
        .await
        .context("failed to set export job total_records")?;
        Ok(())
    }

    pub async fn update_counters(&self, id: &str, exported: i64, failed: i64) -> Result<()> {
        sqlx::query!(
            "UPDATE api_export_jobs SET exported_records = ?1, failed_records = ?2 WHERE id = ?3",
            exported,
            failed,
            id,
        )
        .execute(&self.pool)
        .await
        .context("failed to update export job counters")?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query!("DELETE FROM api_export_jobs WHERE id = ?1", id)
            .execute(&self.pool)
            .await
            .context("failed to delete export job")?;
        sqlx::query!("DELETE FROM api_export_logs WHERE export_job_id = ?1", id)
            .execute(&self.pool)
            .await
            .context("failed to delete export job logs")?;
        Ok(())
    }

    pub async fn insert_log(&self, log: &ExportLogInput<'_>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query!(
            r#"
            INSERT INTO api_export_logs (
                export_job_id, batch_number, records_count, success,
                response_status, error_details, timestamp
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            log.export_job_id,
            log.batch_number,
            log.records_count,
            log.success,
            log.response_status,
            log.error_details,
            now,
        )
        .execute(&self.pool)
        .await
        .context("failed to insert export log")?;
        Ok(())
    }

    pub async fn logs_for_job(&self, export_job_id: &str) -> Result<Vec<ExportLog>> {
        let rows = sqlx::query!(
            r#"
            SELECT id, export_job_id, batch_number, records_count, success,
                response_status, error_details, timestamp
            FROM api_export_logs
            WHERE export_job_id = ?1
            ORDER BY timestamp DESC
            "#,
            export_job_id
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch export logs")?;

        Ok(rows
            .into_iter()
            .map(|row| ExportLog {
                id: row.id,
                export_job_id: row.export_job_id,
                batch_number: row.batch_number,
                records_count: row.records_count,
                success: row.success != 0,
                response_status: row.response_status.map(|s| s as i32),
                error_details: row.error_details,
                timestamp: parse_datetime(&row.timestamp),
            })
            .collect())
    }
}

pub struct ExportLogInput<'a> {
    pub export_job_id: &'a str,
    pub batch_number: i64,
    pub records_count: i64,
    pub success: bool,
    pub response_status: Option<i32>,
    pub error_details: Option<&'a str>,
}
