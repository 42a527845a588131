//! Daemon entrypoint: loads config, bootstraps the store/scheduler, and runs
//! the background poll loop until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use bizdir_crawler::lifecycle;

#[derive(Debug, Parser)]
#[command(name = "bizdir-crawlerd", about = "Business directory crawler daemon")]
struct Config {
    /// Path to the SQLite database file.
    #[arg(long, env = "BIZDIR_DATABASE_PATH", default_value = "bizdir.sqlite3")]
    database_path: PathBuf,

    /// Seconds between poll-loop ticks that retry network-paused jobs.
    #[arg(long, env = "BIZDIR_POLL_INTERVAL_SECS", default_value_t = 30)]
    poll_interval_secs: u64,

    /// `tracing_subscriber::EnvFilter` directive string.
    #[arg(long, env = "BIZDIR_LOG_FILTER", default_value = "info,sqlx=warn")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    lifecycle::init_logging(&config.log_filter);

    let (scheduler, _export_scheduler) = lifecycle::bootstrap(&config.database_path).await?;
    lifecycle::run_poll_loop(scheduler, Duration::from_secs(config.poll_interval_secs)).await;

    tracing::info!("bizdir-crawlerd exiting");
    Ok(())
}
