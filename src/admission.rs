//! Domain Registry / Admission — enforces "at most one active job per
//! canonical domain" (I1) and exposes the pure `canonicalize` primitive to
//! the rest of the crate.

use crate::domain::{canonicalize, Job};
use crate::error::{AppError, Result};
use crate::store::Store;

pub struct Admission {
    store: Store,
}

impl Admission {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Reject if the canonical domain collides with any job whose status is
    /// pending/running/paused. On success, persists the new pending Job.
    pub async fn admit(&self, name: &str, domain: &str) -> Result<Job> {
        self.admit_job(Job::new(name, domain)).await
    }

    /// Same admission check as `admit`, but takes a fully-built `Job` —
    /// used by catalog seeding, which tags metadata (region, country,
    /// base_url, coordinates) onto the job before it ever reaches the store.
    pub async fn admit_job(&self, job: Job) -> Result<Job> {
        if let Some(existing) = self
            .store
            .jobs
            .find_active_by_canonical_domain(&job.canonical_domain)
            .await
            .map_err(AppError::from)?
        {
            return Err(AppError::DomainBusy(format!(
                "{} (existing job {})",
                existing.domain, existing.id
            )));
        }

        self.store.jobs.create(&job).await.map_err(AppError::from)?;
        Ok(job)
    }

    /// Given a catalog of known canonical domains, subtract those currently
    /// held by an active job.
    pub async fn available(&self, catalog: &[String]) -> Result<Vec<String>> {
        let mut free = Vec::with_capacity(catalog.len());
        for domain in catalog {
            let canonical = canonicalize(domain);
            if self
                .store
                .jobs
                .find_active_by_canonical_domain(&canonical)
                .await
                .map_err(AppError::from)?
                .is_none()
            {
                free.push(domain.clone());
            }
        }
        Ok(free)
    }

    pub fn normalize(&self, raw: &str) -> String {
        canonicalize(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;

    #[tokio::test]
    async fn rejects_second_job_for_same_canonical_domain() {
        let store = Store::new(test_pool().await);
        let admission = Admission::new(store.clone());

        let job_a = admission
            .admit("job a", "https://www.yello.ae")
            .await
            .expect("first job admitted");
        store
            .jobs
            .set_status(&job_a.id, crate::domain::JobStatus::Running, None)
            .await
            .unwrap();

        let result = admission.admit("job b", "http://yellowpages.ae/").await;
        assert!(matches!(result, Err(AppError::DomainBusy(_))));
    }

    #[tokio::test]
    async fn admits_after_prior_job_terminal() {
        let store = Store::new(test_pool().await);
        let admission = Admission::new(store.clone());

        let job_a = admission.admit("job a", "https://www.yello.ae").await.unwrap();
        store
            .jobs
            .set_status(&job_a.id, crate::domain::JobStatus::Completed, None)
            .await
            .unwrap();

        let job_b = admission.admit("job b", "http://yellowpages.ae/").await;
        assert!(job_b.is_ok());
    }

    #[tokio::test]
    async fn available_excludes_active_domains() {
        let store = Store::new(test_pool().await);
        let admission = Admission::new(store.clone());
        admission.admit("job a", "https://www.yello.ae").await.unwrap();

        let catalog = vec!["https://www.yello.ae".to_string(), "https://businesslist.pk".to_string()];
        let free = admission.available(&catalog).await.unwrap();
        assert_eq!(free, vec!["https://businesslist.pk".to_string()]);
    }
}
