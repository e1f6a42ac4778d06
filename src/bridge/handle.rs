//! Database handle lifecycle.
//!
//! A [`Database`] owns one native instance and at most one connection.
//! `open`, `close` and `disconnect` run synchronously on the caller's thread;
//! `connect` and `query` are offloaded and return a [`Completion`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bridge::completion::{Completion, deferred};
use crate::bridge::dispatcher::Dispatcher;
use crate::bridge::engine::Instance;
use crate::bridge::marshal::{Row, marshal};
use crate::bridge::request::{ConnectRequest, QueryRequest, Shared};
use crate::bridge::BridgeError;

/// Handle to an open database.
///
/// Clones refer to the same native database. The handle is bound to the event
/// loop whose dispatcher opened it and is not `Send`.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.shared.path())
            .field("connected", &self.shared.is_connected())
            .field("closed", &self.shared.is_closed())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open a database file, or an in-memory database for `None` or an empty path.
    ///
    /// No connection is opened; call [`connect`](Self::connect) before querying.
    ///
    /// # Errors
    /// `ConfigurationFailed` or `OpenFailed` (engine message). Nothing stays
    /// allocated on failure.
    pub fn open(dispatcher: &Dispatcher, path: Option<&Path>) -> Result<Self, BridgeError> {
        let path = path.filter(|p| !p.as_os_str().is_empty());
        let instance = Instance::open(path)?;

        match path {
            Some(p) => tracing::info!(path = %p.display(), "Database opened"),
            None => tracing::info!("In-memory database opened"),
        }

        Ok(Self {
            shared: Arc::new(Shared::new(instance, path.map(Path::to_path_buf))),
            dispatcher: dispatcher.clone(),
        })
    }

    /// Open and connect in one step. Resolves to the connected handle.
    pub fn create(
        dispatcher: &Dispatcher,
        path: Option<&Path>,
    ) -> Result<Completion<Database>, BridgeError> {
        Self::open(dispatcher, path)?.connect()
    }

    /// Close the database, disconnecting first.
    ///
    /// Blocks until any in-flight before-phase on this handle has finished.
    /// Every later operation on any clone fails with `InvalidHandle`.
    pub fn close(&self) -> Result<(), BridgeError> {
        let mut state = self.shared.lock();
        if self.shared.is_closed() {
            return Err(BridgeError::closed());
        }

        self.shared.set_closed();
        self.shared.set_connected(false);
        if let Some(session) = state.session.take() {
            session.close();
        }
        if let Some(instance) = state.instance.take() {
            instance.close();
        }

        tracing::info!(path = ?self.shared.path(), "Database closed");
        Ok(())
    }

    /// Close the current connection, if any. The database stays open.
    pub fn disconnect(&self) -> Result<(), BridgeError> {
        let mut state = self.shared.lock();
        if self.shared.is_closed() {
            return Err(BridgeError::closed());
        }

        self.shared.set_connected(false);
        if let Some(session) = state.session.take() {
            session.close();
            tracing::debug!("Connection closed");
        }
        Ok(())
    }

    /// Open a connection, replacing the current one.
    ///
    /// Resolves to this handle on success; rejects with `ConnectFailed` or
    /// `SchedulerFailed`.
    pub fn connect(&self) -> Result<Completion<Database>, BridgeError> {
        if self.shared.is_closed() {
            return Err(BridgeError::closed());
        }

        let (deferred, completion) = deferred();
        let handle = self.clone();
        let request = ConnectRequest::new(Arc::clone(&self.shared));

        self.dispatcher.queue_work(request, move |status| {
            let outcome = status
                .map_err(BridgeError::from)
                .and_then(ConnectRequest::finish)
                .map(|()| handle);
            deferred.settle(outcome);
        });

        Ok(completion)
    }

    /// Run `sql` on the current connection. Resolves to the result rows.
    ///
    /// # Errors
    /// Fails without dispatching if the handle is closed or has no connection
    /// (`InvalidHandle`), or if the query text cannot be copied (`OutOfMemory`).
    pub fn query(&self, sql: &str) -> Result<Completion<Vec<Row>>, BridgeError> {
        if self.shared.is_closed() {
            return Err(BridgeError::closed());
        }
        if !self.shared.is_connected() {
            return Err(BridgeError::not_connected());
        }

        let request = QueryRequest::new(Arc::clone(&self.shared), sql)?;
        tracing::debug!(sql = request.sql(), "Dispatching query");

        let (deferred, completion) = deferred();
        self.dispatcher.queue_work(request, move |status| {
            let outcome = status
                .map_err(BridgeError::from)
                .and_then(QueryRequest::finish)
                .and_then(marshal);
            deferred.settle(outcome);
        });

        Ok(completion)
    }

    /// Path this database was opened from; `None` for in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.shared.path().map(PathBuf::as_path)
    }

    /// Whether a connection is open, as last recorded by connect or disconnect.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Whether [`close`](Self::close) has run on any clone of this handle.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Whether two handles refer to the same native database.
    pub fn same_handle(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Dispatcher of the loop this handle was opened on.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
