//! Domain models for the business-directory crawler.
//!
//! `Job` owns the crawl lifecycle and resume cursor; `ProgressRecord` is an
//! append-only page-level checkpoint; `Business` is the normalized scraped
//! record; `ExportJob`/`ExportLog` drive the API-export pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// JOB
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Paused)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a `running` job moved to `paused`. `ServerRestart` is not in the
/// original state machine diagram — it is the marker `reconcile_after_restart`
/// stamps on jobs that were `running` when the process last exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Manual,
    NetworkError,
    ServerRestart,
}

impl PauseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::NetworkError => "network_error",
            Self::ServerRestart => "server_restart",
        }
    }
}

impl std::str::FromStr for PauseReason {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "network_error" => Ok(Self::NetworkError),
            "server_restart" => Ok(Self::ServerRestart),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PauseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated ranges for the two tunables an operator can change at runtime.
#[derive(Debug, Clone, Copy)]
pub struct JobSettings {
    pub concurrent_requests: i64,
    pub request_delay: f64,
}

impl JobSettings {
    pub const MIN_CONCURRENT_REQUESTS: i64 = 1;
    pub const MAX_CONCURRENT_REQUESTS: i64 = 20;
    pub const MIN_REQUEST_DELAY: f64 = 0.1;
    pub const MAX_REQUEST_DELAY: f64 = 10.0;

    pub fn validate(concurrent_requests: i64, request_delay: f64) -> crate::error::Result<()> {
        if !(Self::MIN_CONCURRENT_REQUESTS..=Self::MAX_CONCURRENT_REQUESTS)
            .contains(&concurrent_requests)
        {
            return Err(crate::error::AppError::InvalidSettings(format!(
                "concurrent_requests must be between {} and {}, got {concurrent_requests}",
                Self::MIN_CONCURRENT_REQUESTS,
                Self::MAX_CONCURRENT_REQUESTS
            )));
        }
        if !(Self::MIN_REQUEST_DELAY..=Self::MAX_REQUEST_DELAY).contains(&request_delay) {
            return Err(crate::error::AppError::InvalidSettings(format!(
                "request_delay must be between {} and {}, got {request_delay}",
                Self::MIN_REQUEST_DELAY,
                Self::MAX_REQUEST_DELAY
            )));
        }
        Ok(())
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            concurrent_requests: 5,
            request_delay: 1.0,
        }
    }
}

/// A crawl targeting exactly one canonical domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub canonical_domain: String,
    pub status: JobStatus,
    pub concurrent_requests: i64,
    pub request_delay: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_cities: i64,
    pub cities_completed: i64,
    pub total_businesses: i64,
    pub businesses_scraped: i64,
    pub current_domain: Option<String>,
    pub current_city: Option<String>,
    pub current_page: i64,
    pub last_progress_timestamp: Option<DateTime<Utc>>,
    pub pause_reason: Option<PauseReason>,
    pub errors: Vec<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub base_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_seeded: bool,
}

impl Job {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let canonical_domain = crate::domain::canonicalize(&domain);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            domain,
            canonical_domain,
            status: JobStatus::Pending,
            concurrent_requests: JobSettings::default().concurrent_requests,
            request_delay: JobSettings::default().request_delay,
            created_at: Utc::now(),
            started_at: None,
            paused_at: None,
            resumed_at: None,
            completed_at: None,
            total_cities: 0,
            cities_completed: 0,
            total_businesses: 0,
            businesses_scraped: 0,
            current_domain: None,
            current_city: None,
            current_page: 1,
            last_progress_timestamp: None,
            pause_reason: None,
            errors: Vec::new(),
            country: None,
            region: None,
            base_url: None,
            latitude: None,
            longitude: None,
            is_seeded: false,
        }
    }
}

/// Narrows `list_jobs` to a subset of jobs (spec §6). `None` fields are
/// unconstrained.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub canonical_domain: Option<String>,
    pub is_seeded: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Status,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct JobSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for JobSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

/// Per-status job counts, backing `status_summary()`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusSummary {
    pub pending: i64,
    pub running: i64,
    pub paused: i64,
    pub cancelled: i64,
    pub completed: i64,
    pub failed: i64,
}

// ============================================================================
// PROGRESS RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: i64,
    pub job_id: String,
    pub domain: String,
    pub city: String,
    pub page: i64,
    pub businesses_found: i64,
    pub new_businesses: i64,
    pub businesses_scraped: i64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// BUSINESS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    Json,
    Api,
}

impl ExportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Api => "api",
        }
    }
}

impl std::str::FromStr for ExportMode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "api" => Ok(Self::Api),
            _ => Err(()),
        }
    }
}

/// A normalized directory record. `(domain, page_url)` is the uniqueness
/// key; every other field is best-effort and absorbed as `None` on a parse
/// miss rather than failing the whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Business {
    pub id: Option<i64>,
    pub domain: String,
    pub page_url: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub fax: Option<String>,
    pub website: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub working_hours: Option<HashMap<String, String>>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reviews_count: Option<i64>,
    pub rating: Option<f64>,
    pub established_year: Option<i64>,
    pub employees: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub exported_at: Option<DateTime<Utc>>,
    pub export_mode: Option<ExportMode>,
}

/// Outcome of a unique-on-conflict business insert; distinguishes a genuine
/// new record from a dedup hit so counters only advance on the former (I4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    AlreadyExists,
}

// ============================================================================
// EXPORT JOB
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::str::FromStr for ExportStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Post,
    Put,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl std::str::FromStr for RequestMethod {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJobConfig {
    pub endpoint_url: String,
    pub auth_token: Option<String>,
    pub request_method: RequestMethod,
    pub batch_size: i64,
    pub rate_limit_delay: f64,
    pub fields: Option<Vec<String>>,
    pub filters: Option<HashMap<String, String>>,
}

impl Default for ExportJobConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            auth_token: None,
            request_method: RequestMethod::Post,
            batch_size: 100,
            rate_limit_delay: 0.0,
            fields: None,
            filters: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub config: ExportJobConfig,
    pub status: ExportStatus,
    pub total_records: i64,
    pub exported_records: i64,
    pub failed_records: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ExportJob {
    pub fn new(config: ExportJobConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            status: ExportStatus::Pending,
            total_records: 0,
            exported_records: 0,
            failed_records: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportLog {
    pub id: i64,
    pub export_job_id: String,
    pub batch_number: i64,
    pub records_count: i64,
    pub success: bool,
    pub response_status: Option<i32>,
    pub error_details: Option<String>,
    pub timestamp: DateTime<Utc>,
}
