//! Bridge-specific error types.
//!
//! Every bridge operation reports failures as a [`BridgeError`]. Synchronous
//! precondition failures are returned directly; anything that happens after
//! dispatch arrives as the rejection value of a [`Completion`].
//!
//! [`Completion`]: crate::bridge::Completion

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Errors that can occur in the bridge layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// An allocation failed before it could be used.
    #[error("out of memory")]
    OutOfMemory,

    /// The engine configuration could not be built.
    #[error("could not create config: {0}")]
    ConfigurationFailed(String),

    /// The engine refused to open the database (message from the engine).
    #[error("{0}")]
    OpenFailed(String),

    /// A connection could not be opened. The engine reason is logged only.
    #[error("connection failed")]
    ConnectFailed,

    /// The engine rejected or failed a query (message from the engine).
    #[error("{0}")]
    QueryFailed(String),

    /// The offload mechanism itself failed (queue full, worker panic, shutdown).
    #[error("scheduler failed: {0}")]
    SchedulerFailed(String),

    /// Wrong arity or wrong argument type at the host boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Null/closed handle, or a query issued without a live connection.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
}

/// Discriminant of a [`BridgeError`], for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    OutOfMemory,
    ConfigurationFailed,
    OpenFailed,
    ConnectFailed,
    QueryFailed,
    SchedulerFailed,
    InvalidArgument,
    InvalidHandle,
}

impl BridgeError {
    /// Kind tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory => ErrorKind::OutOfMemory,
            Self::ConfigurationFailed(_) => ErrorKind::ConfigurationFailed,
            Self::OpenFailed(_) => ErrorKind::OpenFailed,
            Self::ConnectFailed => ErrorKind::ConnectFailed,
            Self::QueryFailed(_) => ErrorKind::QueryFailed,
            Self::SchedulerFailed(_) => ErrorKind::SchedulerFailed,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidHandle(_) => ErrorKind::InvalidHandle,
        }
    }

    /// Error for an operation attempted on a closed handle.
    pub(crate) fn closed() -> Self {
        Self::InvalidHandle("database is closed".to_string())
    }

    /// Error for a query attempted without a live connection.
    pub(crate) fn not_connected() -> Self {
        Self::InvalidHandle("connection not found, call connect first".to_string())
    }
}

impl From<std::collections::TryReserveError> for BridgeError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}
