use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use qc_tool::{
    config::AppConfig,
    db::{self, queries},
    services::{
        cache::RedisResultCache,
        job::{ChunkedValidationJob, JobContext, JobOutcome},
        queue::JobQueue,
        store::PgTaskStore,
        validator::HttpTextValidator,
    },
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

/// Register help text for every metric the job emits.
fn describe_metrics() {
    metrics::describe_histogram!(
        "qc_validation_chunk_seconds",
        "Time spent validating a single chunk"
    );
    metrics::describe_counter!(
        "qc_validation_chunks_total",
        "Validation chunks processed, by outcome"
    );
    metrics::describe_counter!(
        "qc_validation_jobs_completed",
        "Total validation jobs completed"
    );
    metrics::describe_counter!(
        "qc_validation_jobs_failed",
        "Total validation jobs that failed"
    );
    metrics::describe_counter!(
        "qc_validation_jobs_skipped",
        "Validation jobs whose task record was gone before they ran"
    );
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting validation worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    if let Some(addr) = &config.worker_metrics_addr {
        let addr: std::net::SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
    }
    describe_metrics();

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url, 5)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Initializing services");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");
    let cache =
        RedisResultCache::new(&config.redis_url).expect("Failed to initialize result cache");
    let validator = HttpTextValidator::new(
        &config.validator_url,
        config.validator_api_token.clone(),
        Duration::from_secs(config.validator_timeout_secs),
    )
    .expect("Failed to initialize validation client")
    .with_retry_policy(
        config.validator_max_retries,
        Duration::from_millis(config.validator_retry_backoff_ms),
    );

    let ctx = JobContext {
        store: Arc::new(PgTaskStore::new(db_pool.clone())),
        cache: Arc::new(cache),
        validator: Arc::new(validator),
        settings: config.job_settings(),
    };

    tokio::spawn(cleanup_expired_tasks(
        db_pool,
        config.task_retention(),
        config.cleanup_interval(),
    ));

    tracing::info!("Worker ready, starting job processing loop");

    loop {
        match process_next_job(&queue, &ctx).await {
            Ok(true) => {
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next job from the queue.
/// Returns Ok(true) if a job was processed, Ok(false) if no job available.
async fn process_next_job(
    queue: &JobQueue,
    ctx: &JobContext,
) -> Result<bool, Box<dyn std::error::Error>> {
    let (queued, payload) = match queue.dequeue().await? {
        Some(j) => j,
        None => return Ok(false),
    };

    tracing::info!(
        task_id = %queued.task_id,
        records = queued.records.len(),
        "Processing validation job"
    );

    let job = ChunkedValidationJob::from(queued);
    let outcome = job.execute(ctx).await;

    // A run is final whatever its outcome; failed jobs are not re-queued
    queue.complete(&payload).await?;

    match outcome {
        JobOutcome::Completed { batches, results } => {
            tracing::info!(task_id = %job.task_id, batches, results, "Job completed");
        }
        JobOutcome::Skipped => {
            tracing::info!(task_id = %job.task_id, "Job skipped, task no longer exists");
        }
        JobOutcome::Failed => {
            tracing::warn!(task_id = %job.task_id, "Job failed");
        }
    }

    Ok(true)
}

/// Periodically remove task records past their retention.
async fn cleanup_expired_tasks(pool: PgPool, retention: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let cutoff = match chrono::Duration::from_std(retention) {
            Ok(age) => Utc::now() - age,
            Err(e) => {
                tracing::error!(error = %e, "Task retention out of range, cleanup disabled");
                return;
            }
        };

        match queries::delete_expired_tasks(&pool, cutoff).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Removed expired validation tasks"),
            Err(e) => tracing::error!(error = %e, "Expired task cleanup failed"),
        }
    }
}
