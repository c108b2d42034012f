//! Service configuration.

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/payflow").
    pub data_dir: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Order index poll interval in milliseconds.
    ///
    /// Upper bound on index propagation lag when a nudge is missed.
    pub index_poll_interval_ms: u64,

    /// Maximum outbox events applied per index drain cycle.
    pub index_batch_size: usize,

    /// How many times a request waits on an in-flight duplicate before
    /// giving up with a conflict.
    pub idempotency_wait_attempts: u32,

    /// Delay between in-flight duplicate checks, in milliseconds.
    pub idempotency_wait_delay_ms: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parsed("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_parsed(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            index_poll_interval_ms: env_parsed(
                "INDEX_POLL_INTERVAL_MS",
                defaults.index_poll_interval_ms,
            ),
            index_batch_size: env_parsed("INDEX_BATCH_SIZE", defaults.index_batch_size),
            idempotency_wait_attempts: env_parsed(
                "IDEMPOTENCY_WAIT_ATTEMPTS",
                defaults.idempotency_wait_attempts,
            ),
            idempotency_wait_delay_ms: env_parsed(
                "IDEMPOTENCY_WAIT_DELAY_MS",
                defaults.idempotency_wait_delay_ms,
            ),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/payflow".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            index_poll_interval_ms: 200,
            index_batch_size: 64,
            idempotency_wait_attempts: 20,
            idempotency_wait_delay_ms: 25,
        }
    }
}
