//! Bridge Layer
//!
//! Drives the blocking DuckDB API from a single-threaded event loop:
//! - **Lifecycle**: open, connect, disconnect and close of a database handle
//! - **Dispatch**: blocking calls run on a worker pool, results come back to the loop
//! - **Marshaling**: native result sets become an ordered tree of rows and scalars
//!
//! # Components
//!
//! - [`EventLoop`] / [`Dispatcher`]: the loop and its two-phase work queue
//! - [`Database`]: handle lifecycle and the `connect` / `query` operations
//! - [`Completion`] / [`Deferred`]: one-shot completion pair settled on the loop
//! - [`Row`] / [`Value`]: the marshaled value tree
//! - [`BridgeError`]: every failure the bridge reports

mod completion;
mod dispatcher;
pub mod engine;
mod error;
mod handle;
pub mod marshal;
mod request;

pub use completion::{Completion, Deferred, deferred};
pub use dispatcher::{Dispatcher, EventLoop, SchedulerError, Work};
pub use engine::ResultSet;
pub use error::{BridgeError, ErrorKind};
pub use handle::Database;
pub use marshal::{Row, Value};
