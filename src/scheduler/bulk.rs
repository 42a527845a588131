//! Bulk operations over many jobs at once (§4.3.4).

use crate::domain::{JobStatus, PauseReason};
use crate::error::Result;

use super::Scheduler;

pub async fn pause_all(scheduler: &Scheduler) -> Result<usize> {
    let running = scheduler.store.jobs.list_by_status(JobStatus::Running).await?;
    let mut count = 0;
    for job in running {
        if scheduler.pause(&job.id).await.is_ok() {
            count += 1;
        }
    }
    Ok(count)
}

pub async fn resume_all(scheduler: &Scheduler) -> Result<usize> {
    let paused = scheduler.store.jobs.list_by_status(JobStatus::Paused).await?;
    let mut count = 0;
    for job in paused {
        if scheduler.resume(&job.id).await.is_ok() {
            count += 1;
        }
    }
    Ok(count)
}

/// Resumes only jobs paused because of a network fault, leaving manually
/// paused jobs alone.
pub async fn resume_network_paused(scheduler: &Scheduler) -> Result<usize> {
    let paused = scheduler.store.jobs.list_by_status(JobStatus::Paused).await?;
    let mut count = 0;
    for job in paused {
        if job.pause_reason != Some(PauseReason::NetworkError) {
            continue;
        }
        if scheduler.resume(&job.id).await.is_ok() {
            count += 1;
        }
    }
    Ok(count)
}

/// Resets terminal jobs that never scraped a single business back to
/// `pending`, so a bad initial run (e.g. a site that never resolved any
/// cities) can be retried without recreating the job.
pub async fn restart_zero_extraction(scheduler: &Scheduler) -> Result<usize> {
    let mut count = 0;
    for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
        let jobs = scheduler.store.jobs.list_by_status(status).await?;
        for job in jobs {
            if job.businesses_scraped == 0 {
                scheduler.store.jobs.reset_cursor_to_pending(&job.id).await?;
                count += 1;
            }
        }
    }
    Ok(count)
}
