use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use phrasecast::config::AppConfig;
use phrasecast::db::{self, job_store::{JobStore, PgJobStore}};
use phrasecast::services::retry::RetryPolicy;
use phrasecast::services::storage::R2AudioStore;
use phrasecast::services::synth::GoogleTtsClient;
use phrasecast::services::vault::CredentialVault;
use phrasecast::services::worker::JobWorker;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting speech synthesis worker");

    // Load configuration; a malformed encryption key fails fast here,
    // before any job is touched.
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Prometheus exporter for worker metrics
    let metrics_addr: SocketAddr = config
        .metrics_addr
        .parse()
        .expect("METRICS_ADDR is not a valid socket address");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus metrics exporter");

    metrics::describe_counter!(
        "synthesis_jobs_succeeded",
        "Jobs that reached the succeeded state"
    );
    metrics::describe_counter!(
        "synthesis_jobs_failed",
        "Jobs that reached the failed state"
    );
    metrics::describe_counter!(
        "synthesis_jobs_requeued",
        "Jobs rolled back to queued for retry"
    );
    metrics::describe_histogram!(
        "synthesis_phrase_seconds",
        "Time to synthesize a single phrase"
    );

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Initializing services");
    let store = Arc::new(PgJobStore::new(db_pool));

    let audio = Arc::new(
        R2AudioStore::new(
            &config.r2_bucket,
            &config.r2_endpoint,
            &config.r2_access_key,
            &config.r2_secret_key,
        )
        .expect("Failed to initialize audio store"),
    );

    let vault = Arc::new(
        CredentialVault::new(&config.encryption_key).expect("Failed to initialize credential vault"),
    );

    let synthesizer = Arc::new(
        GoogleTtsClient::new(
            config.tts_endpoint.clone(),
            Duration::from_secs(config.synthesis_timeout_secs),
        )
        .expect("Failed to initialize speech client"),
    );

    let stale_threshold = chrono::Duration::seconds(config.claim_stale_secs as i64);
    let retry_backoff = chrono::Duration::seconds(config.retry_backoff_secs as i64);

    let worker = JobWorker::new(
        store.clone(),
        audio,
        vault,
        synthesizer,
        RetryPolicy::new(config.max_attempts),
        config.worker_id.clone(),
        stale_threshold,
    );

    tracing::info!(worker_id = %config.worker_id, "Worker ready, starting job processing loop");

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    loop {
        match process_next_job(store.as_ref(), &worker, retry_backoff, stale_threshold).await {
            Ok(true) => {
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                tracing::trace!("No jobs due, sleeping");
                sleep(poll_interval).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}

/// Process the next due job, if any.
/// Returns Ok(true) if a job was processed, Ok(false) if none were due.
async fn process_next_job(
    store: &dyn JobStore,
    worker: &JobWorker,
    retry_backoff: chrono::Duration,
    stale_threshold: chrono::Duration,
) -> Result<bool, Box<dyn std::error::Error>> {
    let Some(job_id) = store.next_due_job(retry_backoff, stale_threshold).await? else {
        return Ok(false);
    };

    // Backoff between attempts is enforced here in the scheduler (via
    // next_due_job), not inside the worker core.
    let outcome = worker.process_job(job_id).await?;
    tracing::debug!(job_id = %job_id, outcome = ?outcome, "job invocation finished");

    Ok(true)
}
