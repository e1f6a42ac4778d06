//! Work requests and the native state they operate on.
//!
//! Each request owns everything its before-phase touches: a reference to the
//! handle's shared native state, its inputs, and slots for its outcome. The
//! per-handle mutex is held for the whole before-phase, so requests against
//! one handle never overlap on the native connection.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bridge::BridgeError;
use crate::bridge::dispatcher::Work;
use crate::bridge::engine::{Instance, ResultSet, Session};

// =============================================================================
// Shared Native State
// =============================================================================

/// Native handles owned by one database handle.
#[derive(Debug, Default)]
pub(crate) struct NativeState {
    pub(crate) instance: Option<Instance>,
    pub(crate) session: Option<Session>,
}

/// State shared by every clone of a database handle and its in-flight requests.
///
/// `connected` and `closed` mirror the native state so the loop thread can
/// check preconditions without waiting on a running before-phase.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<NativeState>,
    connected: AtomicBool,
    closed: AtomicBool,
    path: Option<PathBuf>,
}

impl Shared {
    pub(crate) fn new(instance: Instance, path: Option<PathBuf>) -> Self {
        Self {
            state: Mutex::new(NativeState {
                instance: Some(instance),
                session: None,
            }),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            path,
        }
    }

    /// Take the per-handle lock.
    ///
    /// A panicking before-phase cannot leave the native state half-updated
    /// (every mutation is a single `Option` swap), so poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, NativeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

// =============================================================================
// Connect
// =============================================================================

/// Opens a connection on the handle's instance, replacing the current one.
#[derive(Debug)]
pub(crate) struct ConnectRequest {
    shared: Arc<Shared>,
    error: Option<BridgeError>,
}

impl ConnectRequest {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            error: None,
        }
    }

    /// Outcome recorded by the before-phase.
    pub(crate) fn finish(self) -> Result<(), BridgeError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Work for ConnectRequest {
    fn before(&mut self) {
        let mut state = self.shared.lock();

        let opened = match state.instance.as_ref() {
            Some(instance) => instance.connect(),
            None => {
                self.error = Some(BridgeError::closed());
                return;
            }
        };

        match opened {
            Ok(session) => {
                if let Some(previous) = state.session.replace(session) {
                    tracing::debug!("Replacing existing connection");
                    previous.close();
                }
                self.shared.set_connected(true);
            }
            Err(e) => {
                // The previous connection, if any, stays in place.
                tracing::warn!(error = %e, "Failed to open connection");
                self.error = Some(BridgeError::ConnectFailed);
            }
        }
    }
}

// =============================================================================
// Query
// =============================================================================

/// Runs one SQL statement on the handle's connection.
#[derive(Debug)]
pub(crate) struct QueryRequest {
    shared: Arc<Shared>,
    sql: String,
    result: Option<ResultSet>,
    error: Option<BridgeError>,
}

impl QueryRequest {
    /// Build a request, copying `sql` with a fallible allocation.
    pub(crate) fn new(shared: Arc<Shared>, sql: &str) -> Result<Self, BridgeError> {
        let mut owned = String::new();
        owned.try_reserve_exact(sql.len())?;
        owned.push_str(sql);

        Ok(Self {
            shared,
            sql: owned,
            result: None,
            error: None,
        })
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    /// Outcome recorded by the before-phase. Exactly one of result and error
    /// is set once the before-phase has run.
    pub(crate) fn finish(self) -> Result<ResultSet, BridgeError> {
        match (self.error, self.result) {
            (Some(e), _) => Err(e),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(BridgeError::SchedulerFailed(
                "query finished without an outcome".to_string(),
            )),
        }
    }
}

impl Work for QueryRequest {
    fn before(&mut self) {
        let state = self.shared.lock();

        let Some(session) = state.session.as_ref() else {
            // Disconnected or closed between dispatch and execution.
            self.error = Some(if self.shared.is_closed() {
                BridgeError::closed()
            } else {
                BridgeError::not_connected()
            });
            return;
        };

        match session.query(&self.sql) {
            Ok(result) => self.result = Some(result),
            Err(e) => {
                tracing::debug!(error = %e, "Query failed");
                self.error = Some(e);
            }
        }
    }
}
