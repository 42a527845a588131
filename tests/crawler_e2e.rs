//! End-to-end scenarios from the job lifecycle: admission conflicts, resume
//! after pause, network-fault auto-pause, and duplicate resistance — run
//! against a fake `SiteAdapter` so no real HTTP traffic is involved.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use bizdir_crawler::adapter::{City, SiteAdapter};
use bizdir_crawler::admission::Admission;
use bizdir_crawler::domain::{Business, Job, JobStatus, PauseReason};
use bizdir_crawler::error::{AppError, Result};
use bizdir_crawler::scheduler::{AdapterFactory, Scheduler};
use bizdir_crawler::store::Store;

async fn setup_test_db() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to create test database");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("failed to run migrations");
    pool
}

/// A one-city, two-page adapter. The first `fail_after` successful detail
/// fetches succeed; afterward `details` returns a network-ish error so tests
/// can exercise the auto-pause path mid-crawl.
struct ScriptedAdapter {
    pages: Vec<(Vec<String>, bool)>,
    fail_after: Option<usize>,
    detail_calls: AtomicUsize,
}

impl ScriptedAdapter {
    fn two_pages() -> Self {
        Self {
            pages: vec![
                (vec!["https://biz.test/c/1".into(), "https://biz.test/c/2".into()], true),
                (vec!["https://biz.test/c/3".into()], false),
            ],
            fail_after: None,
            detail_calls: AtomicUsize::new(0),
        }
    }

    fn failing_after(n: usize) -> Self {
        Self {
            pages: vec![(vec!["https://biz.test/c/1".into(), "https://biz.test/c/2".into()], false)],
            fail_after: Some(n),
            detail_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SiteAdapter for ScriptedAdapter {
    async fn cities(&self) -> Result<Vec<City>> {
        Ok(vec![City {
            name: "Centralia".into(),
            url: "https://biz.test/location/centralia".into(),
            business_count: 3,
        }])
    }

    async fn listings(&self, _city_url: &str, page: i64) -> Result<(Vec<String>, bool)> {
        let idx = (page - 1) as usize;
        Ok(self.pages.get(idx).cloned().unwrap_or((Vec::new(), false)))
    }

    async fn details(&self, url: &str) -> Result<Option<Business>> {
        let call = self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if call >= limit {
                return Err(AppError::network("connection reset by peer"));
            }
        }
        Ok(Some(Business {
            domain: "biz.test".into(),
            page_url: url.to_string(),
            name: Some("Scripted Business".into()),
            ..Default::default()
        }))
    }
}

struct FixedAdapterFactory(Arc<dyn SiteAdapter>);

impl AdapterFactory for FixedAdapterFactory {
    fn build(&self, _job: &Job) -> Result<Arc<dyn SiteAdapter>> {
        Ok(self.0.clone())
    }
}

async fn wait_until(scheduler: &Scheduler, job_id: &str, pred: impl Fn(&Job) -> bool) -> Job {
    for _ in 0..300 {
        let job = scheduler.status(job_id).await.unwrap();
        if pred(&job) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true for job {job_id}");
}

#[tokio::test]
async fn admission_rejects_conflicting_canonical_domain() {
    let store = Store::new(setup_test_db().await);
    let admission = Admission::new(store.clone());

    admission.admit("run one", "https://www.biz.test").await.unwrap();
    let conflict = admission.admit("run two", "http://biz.test/").await;

    assert!(matches!(conflict, Err(AppError::DomainBusy(_))));
}

#[tokio::test]
async fn full_crawl_completes_and_resists_duplicates() {
    let store = Store::new(setup_test_db().await);
    let adapter: Arc<dyn SiteAdapter> = Arc::new(ScriptedAdapter::two_pages());
    let scheduler = Scheduler::with_factory(store.clone(), Arc::new(FixedAdapterFactory(adapter)));

    let job = scheduler.create_job("full crawl", "https://www.biz.test").await.unwrap();
    scheduler.start(&job.id).await.unwrap();

    let completed = wait_until(&scheduler, &job.id, |j| j.status == JobStatus::Completed).await;
    assert_eq!(completed.businesses_scraped, 3);
    assert_eq!(completed.cities_completed, 1);

    // Re-running the same pages (simulated by inserting the same URL again)
    // must not double count — the unique (domain, page_url) index rejects it.
    let duplicate = Business {
        domain: "biz.test".into(),
        page_url: "https://biz.test/c/1".into(),
        ..Default::default()
    };
    let outcome = store.businesses.insert(&duplicate).await.unwrap();
    assert!(matches!(
        outcome,
        bizdir_crawler::domain::InsertOutcome::AlreadyExists
    ));
    assert_eq!(store.businesses.count_by_domain("biz.test").await.unwrap(), 3);
}

#[tokio::test]
async fn network_failure_pauses_job_for_retry() {
    let store = Store::new(setup_test_db().await);
    let adapter: Arc<dyn SiteAdapter> = Arc::new(ScriptedAdapter::failing_after(0));
    let scheduler = Scheduler::with_factory(store.clone(), Arc::new(FixedAdapterFactory(adapter)));

    let job = scheduler.create_job("flaky crawl", "https://www.biz.test").await.unwrap();
    scheduler.start(&job.id).await.unwrap();

    let paused = wait_until(&scheduler, &job.id, |j| j.status == JobStatus::Paused).await;
    assert_eq!(paused.pause_reason, Some(PauseReason::NetworkError));
    assert!(!paused.errors.is_empty());
}

#[tokio::test]
async fn manual_pause_then_resume_continues_the_crawl() {
    let store = Store::new(setup_test_db().await);
    let adapter: Arc<dyn SiteAdapter> = Arc::new(ScriptedAdapter::two_pages());
    let scheduler = Scheduler::with_factory(store.clone(), Arc::new(FixedAdapterFactory(adapter)));

    let job = scheduler.create_job("pausable crawl", "https://www.biz.test").await.unwrap();
    scheduler.start(&job.id).await.unwrap();

    // Give it a moment to start, then pause; this may race with completion on
    // a fast fake adapter, so only assert the end state is reachable either way.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let _ = scheduler.pause(&job.id).await;

    let current = scheduler.status(&job.id).await.unwrap();
    if current.status == JobStatus::Paused {
        scheduler.resume(&job.id).await.unwrap();
    }

    let final_job = wait_until(&scheduler, &job.id, |j| j.status == JobStatus::Completed).await;
    assert_eq!(final_job.businesses_scraped, 3);
}

#[tokio::test]
async fn force_start_restarts_a_cancelled_job() {
    let store = Store::new(setup_test_db().await);
    let adapter: Arc<dyn SiteAdapter> = Arc::new(ScriptedAdapter::two_pages());
    let scheduler = Scheduler::with_factory(store.clone(), Arc::new(FixedAdapterFactory(adapter)));

    let job = scheduler.create_job("cancel then force", "https://www.biz.test").await.unwrap();
    scheduler.cancel(&job.id).await.unwrap();
    assert_eq!(scheduler.status(&job.id).await.unwrap().status, JobStatus::Cancelled);

    scheduler.force_start(&job.id).await.unwrap();
    let completed = wait_until(&scheduler, &job.id, |j| j.status == JobStatus::Completed).await;
    assert_eq!(completed.businesses_scraped, 3);
}

#[tokio::test]
async fn reconcile_after_restart_pauses_orphaned_running_jobs() {
    let store = Store::new(setup_test_db().await);
    let adapter: Arc<dyn SiteAdapter> = Arc::new(ScriptedAdapter::two_pages());
    let scheduler = Scheduler::with_factory(store.clone(), Arc::new(FixedAdapterFactory(adapter)));

    let job = scheduler.create_job("orphan", "https://www.biz.test").await.unwrap();
    store.jobs.set_status(&job.id, JobStatus::Running, None).await.unwrap();

    let reconciled = scheduler.reconcile_after_restart().await.unwrap();
    assert_eq!(reconciled, 1);
    let reloaded = scheduler.status(&job.id).await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Paused);
    assert_eq!(reloaded.pause_reason, Some(PauseReason::ServerRestart));
}

#[tokio::test]
async fn cancel_flag_stops_a_running_crawl_before_completion() {
    let store = Store::new(setup_test_db().await);
    // A slow-ish adapter: each detail fetch waits briefly so the test has a
    // window to cancel before the (otherwise fast) fake crawl finishes.
    struct SlowAdapter;
    #[async_trait]
    impl SiteAdapter for SlowAdapter {
        async fn cities(&self) -> Result<Vec<City>> {
            Ok(vec![City {
                name: "Centralia".into(),
                url: "https://biz.test/location/centralia".into(),
                business_count: 5,
            }])
        }
        async fn listings(&self, _city_url: &str, page: i64) -> Result<(Vec<String>, bool)> {
            if page == 1 {
                Ok((
                    (1..=5).map(|i| format!("https://biz.test/c/{i}")).collect(),
                    false,
                ))
            } else {
                Ok((Vec::new(), false))
            }
        }
        async fn details(&self, url: &str) -> Result<Option<Business>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Some(Business {
                domain: "biz.test".into(),
                page_url: url.to_string(),
                ..Default::default()
            }))
        }
    }

    let adapter: Arc<dyn SiteAdapter> = Arc::new(SlowAdapter);
    let scheduler = Scheduler::with_factory(store.clone(), Arc::new(FixedAdapterFactory(adapter)));

    let job = scheduler.create_job("cancel mid-flight", "https://www.biz.test").await.unwrap();
    scheduler.start(&job.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    scheduler.cancel(&job.id).await.unwrap();

    // The crawl loop may already have fetched the single in-flight page by
    // the time cancellation lands, but the job must end Cancelled, not
    // Completed — the final completion check has to see the cancel.
    let cancelled = wait_until(&scheduler, &job.id, |j| j.status == JobStatus::Cancelled).await;
    assert_eq!(cancelled.status, JobStatus::Cancelled);
}
