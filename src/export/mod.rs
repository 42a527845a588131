//! API Export Pipeline: pushes scraped businesses to an external HTTP
//! endpoint in batches, tracking per-batch success/failure.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{run, test_connection};
pub use scheduler::ExportScheduler;
