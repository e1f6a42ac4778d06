//! Bridge configuration structures.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default bound on requests awaiting their after-phase.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default idle time before a worker thread exits (10 seconds).
pub const DEFAULT_THREAD_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Default worker thread name.
pub const DEFAULT_THREAD_NAME: &str = "duckbridge-worker";

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info,duckbridge=debug";

const MIN_WORKER_THREADS: usize = 2;
const MAX_WORKER_THREADS: usize = 32;

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(MIN_WORKER_THREADS)
        .clamp(MIN_WORKER_THREADS, MAX_WORKER_THREADS)
}

// =============================================================================
// Dispatcher Configuration
// =============================================================================

/// Worker pool and queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum worker threads (default: available parallelism, 2..=32).
    pub worker_threads: usize,

    /// Maximum requests in flight (default: 1024).
    pub queue_capacity: usize,

    /// Idle worker lifetime (default: "10s").
    #[serde(with = "humantime_serde")]
    pub thread_keep_alive: Duration,

    /// Worker thread name (default: "duckbridge-worker").
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_keep_alive: DEFAULT_THREAD_KEEP_ALIVE,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

// =============================================================================
// Bridge Configuration
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Worker pool settings.
    pub dispatcher: DispatcherConfig,

    /// Database file opened by the CLI; in-memory when unset.
    pub database: Option<PathBuf>,

    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            database: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a YAML file, expanding `${VAR}` references.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&expand_env_vars(&content))
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dispatcher = &self.dispatcher;

        if dispatcher.worker_threads == 0 {
            return Err(ConfigError::ValidationError(
                "dispatcher worker_threads must be positive".to_string(),
            ));
        }

        if dispatcher.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "dispatcher queue_capacity must be positive".to_string(),
            ));
        }

        if dispatcher.thread_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "dispatcher thread_name must not be empty".to_string(),
            ));
        }

        EnvFilter::try_new(&self.log_filter).map_err(|e| {
            ConfigError::ValidationError(format!("invalid log_filter '{}': {e}", self.log_filter))
        })?;

        Ok(())
    }
}
