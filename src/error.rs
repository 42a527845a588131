//! Error types for the business-directory crawler.
//!
//! `AppError` covers domain-level failures; call sites that don't need a
//! specific variant use `anyhow::Result` with `.context(...)`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTML parsing error: {0}")]
    ParseError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Export job not found: {0}")]
    ExportJobNotFound(String),

    #[error("A job for domain {0} is already pending, running, or paused")]
    DomainBusy(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Illegal job state transition: {0}")]
    IllegalTransition(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
