use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use qc_tool::{
    app_state::AppState,
    config::AppConfig,
    db,
    routes,
    services::{cache::RedisResultCache, queue::JobQueue, store::PgTaskStore},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing qc-tool server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "qc_validation_jobs_total",
        "Total validation jobs submitted"
    );
    metrics::describe_gauge!(
        "qc_validation_queue_depth",
        "Current number of pending validation jobs in the queue"
    );

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url, 20)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Connecting to Redis job queue and result cache");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");
    let cache =
        RedisResultCache::new(&config.redis_url).expect("Failed to initialize result cache");

    let store = Arc::new(PgTaskStore::new(db_pool.clone()));
    let state = AppState::new(
        db_pool,
        store,
        queue,
        Arc::new(cache),
        config.job_settings(),
    );

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/validations",
            post(routes::validate::submit_validation),
        )
        .route(
            "/api/v1/validations/{task_id}",
            get(routes::validate::get_task_status),
        )
        .route(
            "/api/v1/validation-results/{cache_key}",
            get(routes::validate::get_cached_result),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
