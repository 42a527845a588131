//! The Scheduler: the control surface over jobs. Owns no crawl state itself
//! beyond a cooperative-cancellation flag per running job — all durable
//! state lives in the `Store`.

pub mod bulk;
pub mod failure;
pub mod state_machine;
pub mod supervisor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::adapter::SiteAdapter;
use crate::admission::Admission;
use crate::domain::{
    Job, JobFilter, JobSettings, JobSort, JobStatus, Paging, PauseReason, StatusSummary,
};
use crate::error::{AppError, Result};
use crate::store::Store;
use state_machine::{can_transition, Transition};

/// Builds the `SiteAdapter` for a job's domain. A trait so tests can swap in
/// a fake adapter instead of issuing real HTTP requests.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, job: &Job) -> Result<Arc<dyn SiteAdapter>>;
}

pub struct YelloAdapterFactory;

impl AdapterFactory for YelloAdapterFactory {
    fn build(&self, job: &Job) -> Result<Arc<dyn SiteAdapter>> {
        let base_url = job
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", job.domain));
        let adapter = crate::adapter::YelloAdapter::new(base_url)
            .map_err(|e| AppError::network(e.to_string()))?;
        Ok(Arc::new(adapter))
    }
}

#[derive(Clone)]
pub struct Scheduler {
    pub(crate) store: Store,
    admission: Admission,
    factory: Arc<dyn AdapterFactory>,
    cancel_flags: Arc<DashMap<String, Arc<AtomicBool>>>,
}

impl Scheduler {
    pub fn new(store: Store) -> Self {
        Self::with_factory(store, Arc::new(YelloAdapterFactory))
    }

    pub fn with_factory(store: Store, factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            admission: Admission::new(store.clone()),
            store,
            factory,
            cancel_flags: Arc::new(DashMap::new()),
        }
    }

    pub async fn create_job(&self, name: &str, domain: &str) -> Result<Job> {
        self.admission.admit(name, domain).await
    }

    pub async fn start(&self, job_id: &str) -> Result<()> {
        self.apply(job_id, Transition::Start).await?;
        self.store
            .jobs
            .set_status(job_id, JobStatus::Running, None)
            .await?;
        self.spawn(job_id).await
    }

    pub async fn resume(&self, job_id: &str) -> Result<()> {
        let job = self.store.jobs.get_by_id(job_id).await?;
        if !can_transition(job.status, Transition::Resume) {
            return Err(illegal_transition(job.status, Transition::Resume));
        }
        self.store.jobs.mark_resumed(job_id).await?;
        self.spawn(job_id).await
    }

    pub async fn force_start(&self, job_id: &str) -> Result<()> {
        let job = self.store.jobs.get_by_id(job_id).await?;
        if !can_transition(job.status, Transition::ForceStart) {
            return Err(illegal_transition(job.status, Transition::ForceStart));
        }
        if let Some(flag) = self.cancel_flags.get(job_id) {
            flag.store(true, Ordering::SeqCst);
        }
        self.cancel_flags.remove(job_id);
        self.store.jobs.reset_for_force_start(job_id).await?;
        self.spawn(job_id).await
    }

    pub async fn pause(&self, job_id: &str) -> Result<()> {
        self.apply(job_id, Transition::PauseManual).await?;
        self.store
            .jobs
            .set_status(job_id, JobStatus::Paused, Some(PauseReason::Manual))
            .await?;
        Ok(())
    }

    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self.store.jobs.get_by_id(job_id).await?;
        if !can_transition(job.status, Transition::Cancel) {
            return Err(illegal_transition(job.status, Transition::Cancel));
        }
        if let Some(flag) = self.cancel_flags.get(job_id) {
            flag.store(true, Ordering::SeqCst);
        }
        self.store
            .jobs
            .set_status(job_id, JobStatus::Cancelled, None)
            .await?;
        Ok(())
    }

    pub async fn status(&self, job_id: &str) -> Result<Job> {
        Ok(self.store.jobs.get_by_id(job_id).await?)
    }

    pub async fn list_jobs(
        &self,
        filter: JobFilter,
        paging: Paging,
        sort: JobSort,
    ) -> Result<Vec<Job>> {
        Ok(self.store.jobs.list_filtered(&filter, &paging, &sort).await?)
    }

    pub async fn status_summary(&self) -> Result<StatusSummary> {
        Ok(self.store.jobs.status_summary().await?)
    }

    pub async fn update_settings(
        &self,
        job_id: &str,
        concurrent_requests: i64,
        request_delay: f64,
    ) -> Result<()> {
        JobSettings::validate(concurrent_requests, request_delay)?;
        self.store
            .jobs
            .update_settings(job_id, concurrent_requests, request_delay)
            .await?;
        Ok(())
    }

    pub async fn pause_all(&self) -> Result<usize> {
        bulk::pause_all(self).await
    }

    pub async fn resume_all(&self) -> Result<usize> {
        bulk::resume_all(self).await
    }

    pub async fn resume_network_paused(&self) -> Result<usize> {
        bulk::resume_network_paused(self).await
    }

    pub async fn restart_zero_extraction(&self) -> Result<usize> {
        bulk::restart_zero_extraction(self).await
    }

    /// Called once at process startup: any job left `running` when the
    /// process last exited is paused with `ServerRestart`, since its crawl
    /// loop died with the process and nothing is currently advancing it.
    pub async fn reconcile_after_restart(&self) -> Result<usize> {
        let running = self.store.jobs.list_by_status(JobStatus::Running).await?;
        let count = running.len();
        for job in running {
            self.store
                .jobs
                .set_status(&job.id, JobStatus::Paused, Some(PauseReason::ServerRestart))
                .await?;
            tracing::warn!(job_id = %job.id, "job paused on restart reconciliation");
        }
        Ok(count)
    }

    async fn apply(&self, job_id: &str, transition: Transition) -> Result<()> {
        let job = self.store.jobs.get_by_id(job_id).await?;
        if !can_transition(job.status, transition) {
            return Err(illegal_transition(job.status, transition));
        }
        Ok(())
    }

    async fn spawn(&self, job_id: &str) -> Result<()> {
        let flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(job_id.to_string(), flag.clone());

        let job = self.store.jobs.get_by_id(job_id).await?;
        let adapter = self.factory.build(&job)?;
        let store = self.store.clone();
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            supervisor::run(store, adapter, job_id, flag).await;
        });
        Ok(())
    }
}

fn illegal_transition(from: JobStatus, transition: Transition) -> AppError {
    AppError::IllegalTransition(format!("cannot apply {transition:?} to a job in state {from}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::City;
    use crate::domain::Business;
    use crate::store::test_pool;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FakeAdapter;

    #[async_trait]
    impl SiteAdapter for FakeAdapter {
        async fn cities(&self) -> Result<Vec<City>> {
            Ok(vec![City {
                name: "Dubai".into(),
                url: "https://fake/location/dubai".into(),
                business_count: 2,
            }])
        }

        async fn listings(&self, _city_url: &str, page: i64) -> Result<(Vec<String>, bool)> {
            if page == 1 {
                Ok((
                    vec![
                        "https://fake/company/1".to_string(),
                        "https://fake/company/2".to_string(),
                    ],
                    false,
                ))
            } else {
                Ok((Vec::new(), false))
            }
        }

        async fn details(&self, url: &str) -> Result<Option<Business>> {
            Ok(Some(Business {
                domain: "fake".into(),
                page_url: url.to_string(),
                name: Some("Test Business".into()),
                ..Default::default()
            }))
        }
    }

    struct FakeAdapterFactory;

    impl AdapterFactory for FakeAdapterFactory {
        fn build(&self, _job: &Job) -> Result<Arc<dyn SiteAdapter>> {
            Ok(Arc::new(FakeAdapter))
        }
    }

    fn test_scheduler(store: Store) -> Scheduler {
        Scheduler::with_factory(store, Arc::new(FakeAdapterFactory))
    }

    async fn wait_for_status(scheduler: &Scheduler, job_id: &str, target: JobStatus) -> Job {
        for _ in 0..200 {
            let job = scheduler.status(job_id).await.unwrap();
            if job.status == target {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached {target:?}");
    }

    #[tokio::test]
    async fn start_runs_job_to_completion_and_counts_businesses() {
        let store = Store::new(test_pool().await);
        let scheduler = test_scheduler(store);

        let job = scheduler.create_job("job a", "https://fake").await.unwrap();
        scheduler.start(&job.id).await.unwrap();

        let completed = wait_for_status(&scheduler, &job.id, JobStatus::Completed).await;
        assert_eq!(completed.businesses_scraped, 2);
        assert_eq!(completed.cities_completed, 1);
    }

    #[tokio::test]
    async fn pause_then_resume_is_legal() {
        let store = Store::new(test_pool().await);
        let scheduler = test_scheduler(store);

        let job = scheduler.create_job("job a", "https://fake").await.unwrap();
        scheduler.start(&job.id).await.unwrap();
        // Pause racing against a fast fake crawl may land after completion;
        // either outcome is a legal transition so we only assert no error.
        let _ = scheduler.pause(&job.id).await;
    }

    #[tokio::test]
    async fn cancel_from_pending_is_rejected() {
        let store = Store::new(test_pool().await);
        let scheduler = test_scheduler(store);

        let job = scheduler.create_job("job a", "https://fake").await.unwrap();
        let result = scheduler.cancel(&job.id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reconcile_after_restart_pauses_running_jobs() {
        let store = Store::new(test_pool().await);
        let scheduler = test_scheduler(store.clone());

        let job = scheduler.create_job("job a", "https://fake").await.unwrap();
        store
            .jobs
            .set_status(&job.id, JobStatus::Running, None)
            .await
            .unwrap();

        let count = scheduler.reconcile_after_restart().await.unwrap();
        assert_eq!(count, 1);
        let reloaded = scheduler.status(&job.id).await.unwrap();
        assert_eq!(reloaded.status, JobStatus::Paused);
        assert_eq!(reloaded.pause_reason, Some(PauseReason::ServerRestart));
    }

    #[tokio::test]
    async fn restart_zero_extraction_resets_only_empty_terminal_jobs() {
        let store = Store::new(test_pool().await);
        let scheduler = test_scheduler(store.clone());

        let job = scheduler.create_job("job a", "https://fake").await.unwrap();
        store
            .jobs
            .set_status(&job.id, JobStatus::Failed, None)
            .await
            .unwrap();

        let count = scheduler.restart_zero_extraction().await.unwrap();
        assert_eq!(count, 1);
        let reloaded = scheduler.status(&job.id).await.unwrap();
        assert_eq!(reloaded.status, JobStatus::Pending);
    }
}
