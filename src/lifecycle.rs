//! Process lifecycle: logging setup, startup reconciliation, and the
//! background poll loop that retries network-paused jobs.

use std::path::Path;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::admission::Admission;
use crate::error::Result;
use crate::export::ExportScheduler;
use crate::scheduler::Scheduler;
use crate::seed;
use crate::store::Store;

pub fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .compact()
        .init();
}

/// Builds the store, seeds the default catalog, reconciles jobs left
/// `running` by a prior process, and returns ready-to-use crawl and export
/// schedulers.
pub async fn bootstrap(database_path: &Path) -> Result<(Scheduler, ExportScheduler)> {
    let pool = crate::db::init_db(database_path).await?;
    let store = Store::new(pool);

    let admission = Admission::new(store.clone());
    let catalog = seed::default_catalog();
    let report = seed::seed_from_catalog(&admission, &store, &catalog, false).await;
    tracing::info!(created = report.created, skipped = report.skipped, "catalog seeded");

    let scheduler = Scheduler::new(store.clone());
    let reconciled = scheduler.reconcile_after_restart().await?;
    if reconciled > 0 {
        tracing::warn!(count = reconciled, "jobs paused on restart reconciliation");
    }

    let export_scheduler = ExportScheduler::new(store);

    Ok((scheduler, export_scheduler))
}

/// Runs the background poll loop until a shutdown signal arrives. Each tick
/// retries jobs paused for a network fault — a manual pause is left alone.
pub async fn run_poll_loop(scheduler: Scheduler, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match scheduler.resume_network_paused().await {
                    Ok(count) if count > 0 => tracing::info!(count, "resumed network-paused jobs"),
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "poll tick failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }
}
