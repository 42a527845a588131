//! The per-job crawl loop (§4.3.2). One `run` call owns one job end to end:
//! discover cities, paginate listings, fetch details, checkpoint, and either
//! finish, pause, or fail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::failure::{classify, Classification};
use crate::adapter::{City, SiteAdapter};
use crate::domain::{InsertOutcome, Job, JobStatus, PauseReason};
use crate::error::{AppError, Result};
use crate::store::Store;

/// Runs one job to completion, pause, or failure. Returns once the job is no
/// longer `running` — the caller (the scheduler) owns restarting it.
pub async fn run(store: Store, adapter: Arc<dyn SiteAdapter>, job_id: String, cancelled: Arc<AtomicBool>) {
    match run_inner(&store, adapter.as_ref(), &job_id, &cancelled).await {
        Ok(()) => {}
        Err(AppError::Cancelled) => {
            tracing::info!(job_id, "job loop exiting: cancelled");
        }
        Err(err) => {
            tracing::error!(job_id, error = %err, "job loop aborted");
            if let Err(store_err) = handle_crawl_error(&store, &job_id, &err.to_string()).await {
                tracing::error!(job_id, error = %store_err, "failed to record job error");
            }
        }
    }
}

async fn run_inner(
    store: &Store,
    adapter: &dyn SiteAdapter,
    job_id: &str,
    cancelled: &AtomicBool,
) -> Result<()> {
    let job = store.jobs.get_by_id(job_id).await?;

    let cities = adapter.cities().await?;
    if cities.is_empty() {
        return Err(AppError::parse("site adapter returned no cities"));
    }
    store
        .jobs
        .set_total_cities_if_zero(job_id, cities.len() as i64)
        .await?;

    let (resume_index, resume_page) = resume_position(store, &job, &cities).await?;

    for city in &cities[resume_index..] {
        let start_page = if city.url == cities[resume_index].url {
            resume_page
        } else {
            1
        };

        if !crawl_city(store, adapter, &job, city, start_page, cancelled).await? {
            return Ok(());
        }

        store.jobs.increment_cities_completed(job_id).await?;
    }

    if cancelled.load(Ordering::SeqCst) {
        return Err(AppError::Cancelled);
    }
    let current = store.jobs.get_by_id(job_id).await?;
    if current.status != JobStatus::Running {
        return Ok(());
    }

    store
        .jobs
        .set_status(job_id, JobStatus::Completed, None)
        .await?;
    tracing::info!(job_id, "job completed");
    Ok(())
}

/// Picks up where the job last left off: prefers the latest checkpoint row
/// over the job's own cursor fields, since a checkpoint is written after
/// every page but the job row only after a full page completes. A
/// ProgressRecord names the page that just finished, so resuming from it
/// means the *next* page, `progress.page + 1`.
async fn resume_position(store: &Store, job: &Job, cities: &[City]) -> Result<(usize, i64)> {
    let target_city = match store.progress.latest_for_job(&job.id).await? {
        Some(progress) if job.current_city.as_deref() == Some(progress.city.as_str()) => {
            return Ok((
                city_index(cities, &progress.city).unwrap_or(0),
                progress.page + 1,
            ));
        }
        Some(progress) => Some(progress.city),
        None => job.current_city.clone(),
    };

    match target_city {
        Some(name) => Ok((city_index(cities, &name).unwrap_or(0), job.current_page.max(1))),
        None => Ok((0, 1)),
    }
}

fn city_index(cities: &[City], name: &str) -> Option<usize> {
    cities.iter().position(|c| c.name == name)
}

/// Crawls one city starting at `start_page`. Returns `Ok(true)` if the city
/// ran to completion, `Ok(false)` if the job was paused/cancelled mid-city
/// (the caller should stop without marking the city complete).
async fn crawl_city(
    store: &Store,
    adapter: &dyn SiteAdapter,
    job: &Job,
    city: &City,
    start_page: i64,
    cancelled: &AtomicBool,
) -> Result<bool> {
    let mut page = start_page;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(AppError::Cancelled);
        }
        let current = store.jobs.get_by_id(&job.id).await?;
        if current.status != JobStatus::Running {
            return Ok(false);
        }

        let (urls, has_next) = adapter.listings(&city.url, page).await?;
        let new_count = fetch_and_store_page(store, adapter, job, city, page, &urls).await?;

        if cancelled.load(Ordering::SeqCst) {
            return Err(AppError::Cancelled);
        }

        store
            .jobs
            .update_cursor(&job.id, &city.name, page)
            .await?;
        tracing::debug!(job_id = %job.id, city = %city.name, page, found = urls.len(), new = new_count, "page processed");

        if !has_next {
            return Ok(true);
        }
        page += 1;
        // Persist the pre-incremented page immediately: a crash before the
        // next iteration's status check must still resume at this page.
        store
            .jobs
            .update_cursor(&job.id, &city.name, page)
            .await?;
    }
}

async fn fetch_and_store_page(
    store: &Store,
    adapter: &dyn SiteAdapter,
    job: &Job,
    city: &City,
    page: i64,
    urls: &[String],
) -> Result<i64> {
    if urls.is_empty() {
        store
            .progress
            .insert(&job.id, &job.domain, &city.name, page, 0, 0, 0)
            .await?;
        return Ok(0);
    }

    let existing = store.businesses.existing_urls(&job.domain, urls).await?;
    let fresh_urls: Vec<String> = urls
        .iter()
        .filter(|u| !existing.contains(*u))
        .cloned()
        .collect();
    let new_url_count = fresh_urls.len() as i64;

    let permits = job.concurrent_requests.max(1) as usize;
    let semaphore = Arc::new(Semaphore::new(permits));
    let delay = Duration::from_secs_f64(job.request_delay.max(0.0));

    let mut tasks = Vec::with_capacity(fresh_urls.len());
    for url in fresh_urls {
        let semaphore = semaphore.clone();
        let task = async move {
            let _permit = semaphore.acquire().await.expect("semaphore not closed");
            tokio::time::sleep(delay).await;
            adapter.details(&url).await
        };
        tasks.push(task);
    }

    let details = futures::future::join_all(tasks).await;

    let mut successful_saves = 0i64;
    for result in details {
        let Some(business) = result? else { continue };
        if matches!(store.businesses.insert(&business).await?, InsertOutcome::Inserted(_)) {
            successful_saves += 1;
        }
    }

    // total_businesses counts every URL discovered on the page, not just the
    // ones that turned out to be new (I3); businesses_scraped counts only
    // genuine new inserts (I4).
    store
        .jobs
        .increment_total_businesses(&job.id, urls.len() as i64)
        .await?;
    if successful_saves > 0 {
        store
            .jobs
            .increment_businesses_scraped(&job.id, successful_saves)
            .await?;
    }

    store
        .progress
        .insert(
            &job.id,
            &job.domain,
            &city.name,
            page,
            urls.len() as i64,
            new_url_count,
            successful_saves,
        )
        .await?;

    Ok(successful_saves)
}

/// Decides pause-vs-fail for an error surfaced while a job is running, and
/// applies the corresponding status transition.
pub async fn handle_crawl_error(store: &Store, job_id: &str, message: &str) -> Result<()> {
    store.jobs.append_error(job_id, message).await?;
    match classify(message) {
        Classification::Network => {
            store
                .jobs
                .set_status(job_id, JobStatus::Paused, Some(PauseReason::NetworkError))
                .await?;
        }
        Classification::Fatal => {
            store.jobs.set_status(job_id, JobStatus::Failed, None).await?;
        }
    }
    Ok(())
}
