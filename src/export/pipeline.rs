//! Runs one export job to completion: count matching records, push them to
//! the configured endpoint in batches, and record per-batch outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::adapter::http::{create_client, ClientType};
use crate::domain::{Business, ExportJob, ExportMode, ExportStatus, RequestMethod};
use crate::error::{AppError, Result};
use crate::store::sqlite::export_repository::ExportLogInput;
use crate::store::Store;

/// Runs `job_id` end to end. Returns once the job reaches a terminal status
/// (completed/failed/cancelled); cooperative cancellation is checked between
/// batches via `stop`.
pub async fn run(store: Store, job_id: String, stop: Arc<AtomicBool>) {
    if let Err(err) = run_inner(&store, &job_id, &stop).await {
        tracing::error!(export_job_id = %job_id, error = %err, "export job aborted");
        let _ = store.exports.set_error(&job_id, &err.to_string()).await;
    }
}

async fn run_inner(store: &Store, job_id: &str, stop: &AtomicBool) -> Result<()> {
    let job = store.exports.get_by_id(job_id).await?;
    store.exports.set_status(job_id, ExportStatus::Running).await?;

    let filters = job.config.filters.clone().unwrap_or_default();
    let city = filters.get("city").map(String::as_str);
    let category = filters.get("category").map(String::as_str);

    let total = store.businesses.count_unexported(city, category).await?;
    store.exports.set_total_records(job_id, total).await?;

    let client = create_client(ClientType::Standard).map_err(|e| AppError::network(e.to_string()))?;

    let mut exported = 0i64;
    let mut failed = 0i64;
    let mut record_number = 0i64;
    // A failed record is never marked exported, so it stays in the
    // unexported set — `skip` advances past it so the next fetch doesn't
    // hand it back forever. Successful records disappear from the set on
    // their own, so `skip` only needs to grow on failure.
    let mut skip = 0i64;

    loop {
        // batch_size is only a DB-query page-size hint here — the wire
        // contract pushes one JSON body per record (spec §6).
        let batch = store
            .businesses
            .find_unexported(city, category, job.config.batch_size, skip)
            .await?;
        if batch.is_empty() {
            break;
        }

        for business in &batch {
            if stop.load(Ordering::SeqCst) {
                store.exports.update_counters(job_id, exported, failed).await?;
                store.exports.set_status(job_id, ExportStatus::Cancelled).await?;
                return Ok(());
            }

            record_number += 1;
            match push_record(&client, &job, business).await {
                Ok(status) => {
                    if let Some(id) = business.id {
                        store.businesses.mark_exported(id, ExportMode::Api).await?;
                    }
                    exported += 1;
                    store
                        .exports
                        .insert_log(&ExportLogInput {
                            export_job_id: job_id,
                            batch_number: record_number,
                            records_count: 1,
                            success: true,
                            response_status: Some(status as i32),
                            error_details: None,
                        })
                        .await?;
                }
                Err(err) => {
                    // A failed record (non-2xx or transport error) is a
                    // counted failure, not an uncaught exception — it does
                    // not abort the job (§7, error kind 2).
                    failed += 1;
                    skip += 1;
                    let message = err.to_string();
                    tracing::warn!(export_job_id = job_id, error = %message, "failed to export business record");
                    store
                        .exports
                        .insert_log(&ExportLogInput {
                            export_job_id: job_id,
                            batch_number: record_number,
                            records_count: 1,
                            success: false,
                            response_status: None,
                            error_details: Some(&message),
                        })
                        .await?;
                }
            }

            if record_number % 10 == 0 {
                store.exports.update_counters(job_id, exported, failed).await?;
            }

            if job.config.rate_limit_delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(job.config.rate_limit_delay)).await;
            }
        }
    }

    store.exports.update_counters(job_id, exported, failed).await?;
    store.exports.set_status(job_id, ExportStatus::Completed).await?;
    tracing::info!(export_job_id = job_id, exported, failed, "export job completed");
    Ok(())
}

fn business_payload(business: &Business, fields: Option<&[String]>) -> serde_json::Value {
    let full = json!(business);
    match fields {
        None => full,
        Some(fields) => {
            let mut selected = serde_json::Map::new();
            if let Some(obj) = full.as_object() {
                for field in fields {
                    if let Some(value) = obj.get(field) {
                        selected.insert(field.clone(), value.clone());
                    }
                }
            }
            serde_json::Value::Object(selected)
        }
    }
}

/// Pushes one business as one JSON body (spec §6's wire contract). Success
/// is any status in [200, 300); anything else is a counted failure, not an
/// uncaught exception, so the caller never aborts the job over it.
async fn push_record(client: &rquest::Client, job: &ExportJob, business: &Business) -> Result<u16> {
    let fields = job.config.fields.as_deref();
    let payload = business_payload(business, fields);

    let mut request = match job.config.request_method {
        RequestMethod::Post => client.post(&job.config.endpoint_url),
        RequestMethod::Put => client.put(&job.config.endpoint_url),
    };
    if let Some(token) = &job.config.auth_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .json(&payload)
        .send()
        .await
        .map_err(|e| AppError::network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::network(format!("endpoint responded with {status}")));
    }
    Ok(status.as_u16())
}

/// A lightweight probe used by the API settings screen to validate an
/// endpoint/token pair before a real export job is created.
pub async fn test_connection(endpoint_url: &str, auth_token: Option<&str>) -> Result<u16> {
    let client = create_client(ClientType::Standard).map_err(|e| AppError::network(e.to_string()))?;
    let mut request = client.get(endpoint_url);
    if let Some(token) = auth_token {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .map_err(|e| AppError::network(e.to_string()))?;
    Ok(response.status().as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExportJobConfig, RequestMethod};
    use crate::store::test_pool;

    async fn seed_business(store: &Store, page_url: &str) {
        let business = Business {
            domain: "fake.test".into(),
            page_url: page_url.into(),
            name: Some("Acme".into()),
            ..Default::default()
        };
        store.businesses.insert(&business).await.unwrap();
    }

    #[tokio::test]
    async fn exports_all_unexported_businesses_in_batches() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ingest")
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let store = Store::new(test_pool().await);
        seed_business(&store, "https://fake.test/company/1").await;
        seed_business(&store, "https://fake.test/company/2").await;

        let config = ExportJobConfig {
            endpoint_url: format!("{}/ingest", server.url()),
            auth_token: Some("secret".into()),
            request_method: RequestMethod::Post,
            batch_size: 1,
            rate_limit_delay: 0.0,
            fields: None,
            filters: None,
        };
        let job = ExportJob::new(config);
        store.exports.create(&job).await.unwrap();

        run(store.clone(), job.id.clone(), Arc::new(AtomicBool::new(false))).await;

        let reloaded = store.exports.get_by_id(&job.id).await.unwrap();
        assert_eq!(reloaded.status, ExportStatus::Completed);
        assert_eq!(reloaded.exported_records, 2);
        assert_eq!(reloaded.failed_records, 0);
    }

    #[tokio::test]
    async fn counts_failure_on_non_success_response_but_still_completes() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ingest")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let store = Store::new(test_pool().await);
        seed_business(&store, "https://fake.test/company/1").await;

        let config = ExportJobConfig {
            endpoint_url: format!("{}/ingest", server.url()),
            auth_token: None,
            request_method: RequestMethod::Post,
            batch_size: 10,
            rate_limit_delay: 0.0,
            fields: None,
            filters: None,
        };
        let job = ExportJob::new(config);
        store.exports.create(&job).await.unwrap();

        run(store.clone(), job.id.clone(), Arc::new(AtomicBool::new(false))).await;

        let reloaded = store.exports.get_by_id(&job.id).await.unwrap();
        assert_eq!(reloaded.status, ExportStatus::Completed);
        assert_eq!(reloaded.exported_records, 0);
        assert_eq!(reloaded.failed_records, 1);
    }
}
