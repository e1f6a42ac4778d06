//! duckbridge - async bridge over the blocking DuckDB API
//!
//! This crate lets a single-threaded event loop drive DuckDB without stalling:
//! blocking engine calls run on a bounded worker pool and their results come
//! back to the loop as completions. It can be used as a library, or through the
//! `duckbridge` executable, which runs SQL statements and prints the rows as JSON.
//!
//! # Architecture
//!
//! - **Bridge**: handle lifecycle, two-phase work dispatch, result marshaling
//! - **Exports**: the dynamically typed host function table
//! - **Config**: YAML configuration for the worker pool and logging
//!
//! # Example
//!
//! ```rust,no_run
//! use duckbridge::{Database, EventLoop, config::DispatcherConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let event_loop = EventLoop::new(&DispatcherConfig::default())?;
//!     let db = Database::open(&event_loop.dispatcher(), None)?;
//!
//!     let rows = event_loop.block_on(async {
//!         db.connect()?.await?;
//!         db.query("SELECT 42 AS answer")?.await
//!     })?;
//!     println!("{}", serde_json::to_string(&rows)?);
//!
//!     db.close()?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod exports;

pub use bridge::{BridgeError, Completion, Database, Dispatcher, ErrorKind, EventLoop, Row, Value};
pub use exports::{Exports, HostReturn, HostValue, Promise, Settled};
