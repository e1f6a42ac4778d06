//! Native engine adapter.
//!
//! Thin synchronous layer over the `duckdb` crate. Everything here blocks the
//! calling thread, so it is only ever invoked from a worker before-phase or
//! from the synchronous lifecycle calls (`open`, `close`, `disconnect`).
//!
//! DuckDB's Rust API has no separate database type: the connection returned by
//! `Connection::open*` owns the database instance, and `try_clone()` opens a
//! further connection on that same instance. [`Instance`] keeps the former,
//! [`Session`] wraps the latter.

use std::path::Path;

use duckdb::arrow::datatypes::DataType;
use duckdb::types::Value as NativeValue;
use duckdb::{AccessMode, Config, Connection};

use crate::bridge::BridgeError;

// =============================================================================
// Instance
// =============================================================================

/// An open native database instance.
pub struct Instance {
    conn: Connection,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance").finish_non_exhaustive()
    }
}

impl Instance {
    /// Open a database. `None` opens a non-persistent in-memory database.
    ///
    /// # Errors
    /// `ConfigurationFailed` if the engine config cannot be built, `OpenFailed`
    /// with the engine's message if the open itself fails.
    pub fn open(path: Option<&Path>) -> Result<Self, BridgeError> {
        let config = engine_config()?;

        let conn = match path {
            Some(path) => Connection::open_with_flags(path, config),
            None => Connection::open_in_memory_with_flags(config),
        }
        .map_err(|e| BridgeError::OpenFailed(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Open a new connection on this instance.
    pub fn connect(&self) -> Result<Session, duckdb::Error> {
        let conn = self.conn.try_clone()?;
        Ok(Session { conn })
    }

    /// Close the instance. Outstanding sessions keep the engine alive until dropped.
    pub fn close(self) {
        if let Err((_conn, e)) = self.conn.close() {
            tracing::warn!(error = %e, "Database close reported an error");
        }
    }
}

/// Adapter configuration. Caller-supplied engine options are not passed through.
fn engine_config() -> Result<Config, BridgeError> {
    Config::default()
        .access_mode(AccessMode::Automatic)
        .map_err(|e| BridgeError::ConfigurationFailed(e.to_string()))
}

// =============================================================================
// Session
// =============================================================================

/// A live connection. Usable by one caller at a time.
pub struct Session {
    conn: Connection,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Run `sql` and materialize the complete result.
    ///
    /// Cell storage is reserved fallibly, so an allocation failure surfaces as
    /// `OutOfMemory` instead of aborting. Any partially built result is dropped
    /// on the error path.
    pub fn query(&self, sql: &str) -> Result<ResultSet, BridgeError> {
        let mut stmt = self.conn.prepare(sql).map_err(query_failed)?;
        let mut rows = stmt.query([]).map_err(query_failed)?;

        // Column metadata only exists once the statement has executed.
        let (columns, time_zoned): (Vec<String>, Vec<bool>) = match rows.as_ref() {
            Some(stmt) => (0..stmt.column_count())
                .map(|i| {
                    let name = stmt
                        .column_name(i)
                        .map(|name| name.to_string())
                        .unwrap_or_else(|_| format!("col{i}"));
                    let zoned = matches!(stmt.column_type(i), DataType::Timestamp(_, Some(_)));
                    (name, zoned)
                })
                .unzip(),
            None => (Vec::new(), Vec::new()),
        };

        let width = columns.len();
        let mut result = ResultSet {
            columns,
            time_zoned,
            rows: Vec::new(),
        };

        while let Some(row) = rows.next().map_err(query_failed)? {
            let mut cells = Vec::new();
            cells.try_reserve_exact(width)?;
            for idx in 0..width {
                cells.push(row.get::<_, NativeValue>(idx).map_err(query_failed)?);
            }
            result.rows.try_reserve(1)?;
            result.rows.push(cells);
        }

        Ok(result)
    }

    /// Close the connection, logging (not surfacing) engine complaints.
    pub fn close(self) {
        if let Err((_conn, e)) = self.conn.close() {
            tracing::warn!(error = %e, "Connection close reported an error");
        }
    }
}

fn query_failed(e: duckdb::Error) -> BridgeError {
    BridgeError::QueryFailed(e.to_string())
}

// =============================================================================
// Result Set
// =============================================================================

/// A fully materialized native result: column names plus owned cells, row-major.
///
/// Native cells do not say whether a timestamp carries a time zone, so that
/// is recorded per column from the result schema.
#[derive(Debug, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    time_zoned: Vec<bool>,
    rows: Vec<Vec<NativeValue>>,
}

impl ResultSet {
    /// Column names in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether column `idx` is a TIMESTAMP WITH TIME ZONE.
    pub fn is_time_zoned(&self, idx: usize) -> bool {
        self.time_zoned.get(idx).copied().unwrap_or(false)
    }

    /// Split into column names, time-zone flags and rows, consuming the set.
    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<bool>, Vec<Vec<NativeValue>>) {
        (self.columns, self.time_zoned, self.rows)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<NativeValue>>) -> Self {
        let time_zoned = vec![false; columns.len()];
        Self {
            columns,
            time_zoned,
            rows,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_time_zoned(mut self, idx: usize) -> Self {
        self.time_zoned[idx] = true;
        self
    }
}
