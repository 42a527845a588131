//! `ExportScheduler`: the control surface over export jobs, mirroring
//! `scheduler::Scheduler`'s cooperative-cancellation pattern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::{ExportJob, ExportJobConfig, ExportLog, ExportStatus};
use crate::error::{AppError, Result};
use crate::store::Store;

use super::pipeline;

#[derive(Clone)]
pub struct ExportScheduler {
    store: Store,
    cancel_flags: Arc<DashMap<String, Arc<AtomicBool>>>,
}

impl ExportScheduler {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            cancel_flags: Arc::new(DashMap::new()),
        }
    }

    pub async fn create(&self, config: ExportJobConfig) -> Result<ExportJob> {
        let job = ExportJob::new(config);
        self.store.exports.create(&job).await?;
        Ok(job)
    }

    /// Spawns the export pipeline for a pending or previously-stopped job.
    pub async fn start(&self, job_id: &str) -> Result<()> {
        let job = self.store.exports.get_by_id(job_id).await?;
        if job.status == ExportStatus::Running {
            return Err(AppError::IllegalTransition(format!(
                "export job {job_id} is already running"
            )));
        }

        let flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(job_id.to_string(), flag.clone());

        let store = self.store.clone();
        let id = job_id.to_string();
        tokio::spawn(async move {
            pipeline::run(store, id, flag).await;
        });
        Ok(())
    }

    /// Signals cooperative cancellation; the pipeline checks the flag
    /// between records and settles the job as `Cancelled` on its own.
    pub async fn stop(&self, job_id: &str) -> Result<()> {
        match self.cancel_flags.get(job_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(AppError::ExportJobNotFound(job_id.to_string())),
        }
    }

    pub async fn delete(&self, job_id: &str) -> Result<()> {
        if let Some(flag) = self.cancel_flags.get(job_id) {
            flag.store(true, Ordering::SeqCst);
        }
        self.cancel_flags.remove(job_id);
        Ok(self.store.exports.delete(job_id).await?)
    }

    pub async fn get(&self, job_id: &str) -> Result<ExportJob> {
        Ok(self.store.exports.get_by_id(job_id).await?)
    }

    pub async fn list(&self) -> Result<Vec<ExportJob>> {
        Ok(self.store.exports.list_all().await?)
    }

    pub async fn get_logs(&self, job_id: &str) -> Result<Vec<ExportLog>> {
        Ok(self.store.exports.logs_for_job(job_id).await?)
    }

    /// Probes an endpoint/token pair without creating a job, for the API
    /// settings screen.
    pub async fn test_connection(&self, endpoint_url: &str, auth_token: Option<&str>) -> Result<u16> {
        pipeline::test_connection(endpoint_url, auth_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequestMethod;
    use crate::store::test_pool;
    use std::time::Duration;

    fn test_config(endpoint_url: String) -> ExportJobConfig {
        ExportJobConfig {
            endpoint_url,
            auth_token: None,
            request_method: RequestMethod::Post,
            batch_size: 10,
            rate_limit_delay: 0.05,
            fields: None,
            filters: None,
        }
    }

    async fn wait_for_status(scheduler: &ExportScheduler, job_id: &str, target: ExportStatus) -> ExportJob {
        for _ in 0..200 {
            let job = scheduler.get(job_id).await.unwrap();
            if job.status == target {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("export job never reached {target:?}");
    }

    #[tokio::test]
    async fn start_runs_job_to_completion() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ingest")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let store = Store::new(test_pool().await);
        let business = crate::domain::Business {
            domain: "fake.test".into(),
            page_url: "https://fake.test/company/1".into(),
            name: Some("Acme".into()),
            ..Default::default()
        };
        store.businesses.insert(&business).await.unwrap();

        let scheduler = ExportScheduler::new(store);
        let job = scheduler
            .create(test_config(format!("{}/ingest", server.url())))
            .await
            .unwrap();
        scheduler.start(&job.id).await.unwrap();

        let completed = wait_for_status(&scheduler, &job.id, ExportStatus::Completed).await;
        assert_eq!(completed.exported_records, 1);
    }

    #[tokio::test]
    async fn stop_cancels_a_running_job() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ingest")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let store = Store::new(test_pool().await);
        for i in 0..5 {
            let business = crate::domain::Business {
                domain: "fake.test".into(),
                page_url: format!("https://fake.test/company/{i}"),
                name: Some("Acme".into()),
                ..Default::default()
            };
            store.businesses.insert(&business).await.unwrap();
        }

        let mut config = test_config(format!("{}/ingest", server.url()));
        config.rate_limit_delay = 0.2;
        let scheduler = ExportScheduler::new(store);
        let job = scheduler.create(config).await.unwrap();
        scheduler.start(&job.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop(&job.id).await.unwrap();

        let settled = wait_for_status(&scheduler, &job.id, ExportStatus::Cancelled).await;
        assert!(settled.exported_records < 5);
    }

    #[tokio::test]
    async fn stop_unknown_job_is_an_error() {
        let store = Store::new(test_pool().await);
        let scheduler = ExportScheduler::new(store);
        let result = scheduler.stop("missing").await;
        assert!(matches!(result, Err(AppError::ExportJobNotFound(_))));
    }
}
