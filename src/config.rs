//! Configuration module.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Dispatcher settings (worker threads, queue capacity, thread keep-alive)
//! - The database file the CLI opens
//! - The default log filter

mod app;
mod validation;

pub use app::{BridgeConfig, DispatcherConfig};
pub use app::{DEFAULT_LOG_FILTER, DEFAULT_QUEUE_CAPACITY, DEFAULT_THREAD_NAME};
pub use validation::{ConfigError, expand_env_vars, parse_duration};
