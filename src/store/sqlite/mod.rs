pub mod business_repository;
pub mod export_repository;
pub mod job_repository;
pub mod progress_repository;

use chrono::{DateTime, Utc};

use crate::domain::{ExportStatus, JobStatus, PauseReason};

pub(crate) fn map_job_status(s: &str) -> JobStatus {
    s.parse().unwrap_or(JobStatus::Failed)
}

pub(crate) fn map_pause_reason(s: Option<&str>) -> Option<PauseReason> {
    s.and_then(|s| s.parse().ok())
}

pub(crate) fn map_export_status(s: &str) -> ExportStatus {
    s.parse().unwrap_or(ExportStatus::Failed)
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_datetime_opt(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.map(parse_datetime)
}
