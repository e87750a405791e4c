use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for job queue and result cache
    pub redis_url: String,

    /// Base URL of the external text validation service
    pub validator_url: String,

    /// Bearer token for the validation service, if it requires one
    #[serde(default)]
    pub validator_api_token: Option<String>,

    /// Records sent to the validation service per call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Lifetime of the combined result in the cache
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Hard cap on a single job run
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Per-request timeout for the validation service
    #[serde(default = "default_validator_timeout_secs")]
    pub validator_timeout_secs: u64,

    /// Extra attempts the validation client makes on transient failures
    #[serde(default = "default_validator_max_retries")]
    pub validator_max_retries: u32,

    /// Initial backoff between validation client attempts (doubles each time)
    #[serde(default = "default_validator_retry_backoff_ms")]
    pub validator_retry_backoff_ms: u64,

    /// Task records older than this are removed by the worker's cleanup pass
    #[serde(default = "default_task_retention_secs")]
    pub task_retention_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Prometheus scrape address for the worker (e.g., "0.0.0.0:9100"). Unset disables it.
    #[serde(default)]
    pub worker_metrics_addr: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_chunk_size() -> usize {
    25
}

fn default_cache_ttl_secs() -> u64 {
    15 * 60
}

// 8 chunks at roughly 120s each
fn default_job_timeout_secs() -> u64 {
    900
}

fn default_validator_timeout_secs() -> u64 {
    120
}

fn default_validator_max_retries() -> u32 {
    2
}

fn default_validator_retry_backoff_ms() -> u64 {
    500
}

fn default_task_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_cleanup_interval_secs() -> u64 {
    5 * 60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Settings handed to every job run.
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            chunk_size: self.chunk_size.max(1),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    pub fn task_retention(&self) -> Duration {
        Duration::from_secs(self.task_retention_secs)
    }

    /// Never zero; `tokio::time::interval` panics on a zero period.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Tunables for a single chunked validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    pub chunk_size: usize,
    pub cache_ttl: Duration,
    pub timeout: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cache_ttl: Duration::from_secs(default_cache_ttl_secs()),
            timeout: Duration::from_secs(default_job_timeout_secs()),
        }
    }
}
