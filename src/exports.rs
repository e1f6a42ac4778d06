//! Host-facing function table.
//!
//! A dynamically typed entry point over [`Database`]: the host calls functions
//! by name with a slice of [`HostValue`] arguments. Argument counts are checked
//! strictly and type mismatches are reported as `InvalidArgument` before
//! anything is dispatched.
//!
//! | Function     | Arguments                      | Returns                       |
//! |--------------|--------------------------------|-------------------------------|
//! | `open`       | optional path string           | handle                        |
//! | `close`      | handle                         | undefined                     |
//! | `connect`    | handle                         | promise resolving to handle   |
//! | `disconnect` | handle                         | undefined                     |
//! | `query`      | handle, SQL string             | promise resolving to rows     |

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::bridge::{BridgeError, Completion, Database, Dispatcher, Row};

/// Names of every exported function.
pub const FUNCTIONS: [&str; 5] = ["open", "close", "connect", "disconnect", "query"];

/// An argument passed in from the host.
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    String(String),
    Handle(Database),
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Database> for HostValue {
    fn from(db: Database) -> Self {
        Self::Handle(db)
    }
}

/// What a call hands back to the host.
#[derive(Debug)]
pub enum HostReturn {
    Undefined,
    Handle(Database),
    Promise(Promise),
}

impl HostReturn {
    pub fn into_handle(self) -> Option<Database> {
        match self {
            Self::Handle(db) => Some(db),
            _ => None,
        }
    }

    pub fn into_promise(self) -> Option<Promise> {
        match self {
            Self::Promise(promise) => Some(promise),
            _ => None,
        }
    }
}

/// A pending result of `connect` or `query`.
#[derive(Debug)]
pub enum Promise {
    Handle(Completion<Database>),
    Rows(Completion<Vec<Row>>),
}

/// The value a [`Promise`] settles to.
#[derive(Debug)]
pub enum Settled {
    Handle(Database),
    Rows(Vec<Row>),
}

impl Settled {
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Handle(_) => None,
        }
    }
}

impl Future for Promise {
    type Output = Result<Settled, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            Self::Handle(completion) => Pin::new(completion).poll(cx).map(|r| r.map(Settled::Handle)),
            Self::Rows(completion) => Pin::new(completion).poll(cx).map(|r| r.map(Settled::Rows)),
        }
    }
}

/// Function table bound to one event loop.
#[derive(Debug, Clone)]
pub struct Exports {
    dispatcher: Dispatcher,
}

impl Exports {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Call an exported function by name.
    ///
    /// # Errors
    /// `InvalidArgument` for unknown names, wrong argument counts or types;
    /// otherwise whatever the underlying operation reports synchronously.
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostReturn, BridgeError> {
        tracing::trace!(function = name, argc = args.len(), "Host call");

        match name {
            "open" => self.open(args).map(HostReturn::Handle),
            "close" => self.close(args).map(|()| HostReturn::Undefined),
            "connect" => self.connect(args).map(|c| HostReturn::Promise(Promise::Handle(c))),
            "disconnect" => self.disconnect(args).map(|()| HostReturn::Undefined),
            "query" => self.query(args).map(|c| HostReturn::Promise(Promise::Rows(c))),
            _ => Err(BridgeError::InvalidArgument(format!(
                "unknown function '{name}'"
            ))),
        }
    }

    /// `open([path])`. A missing, undefined, null or empty path opens in memory.
    pub fn open(&self, args: &[HostValue]) -> Result<Database, BridgeError> {
        if args.len() > 1 {
            return Err(BridgeError::InvalidArgument(
                "expected at most one argument: path".to_string(),
            ));
        }

        let path = match args.first() {
            None | Some(HostValue::Undefined) | Some(HostValue::Null) => None,
            Some(HostValue::String(s)) => Some(Path::new(s.as_str())),
            Some(HostValue::Handle(_)) => {
                return Err(BridgeError::InvalidArgument(
                    "path must be a string".to_string(),
                ));
            }
        };

        Database::open(&self.dispatcher, path)
    }

    /// `close(db)`.
    pub fn close(&self, args: &[HostValue]) -> Result<(), BridgeError> {
        single_database(args)?.close()
    }

    /// `connect(db)`.
    pub fn connect(&self, args: &[HostValue]) -> Result<Completion<Database>, BridgeError> {
        single_database(args)?.connect()
    }

    /// `disconnect(db)`.
    pub fn disconnect(&self, args: &[HostValue]) -> Result<(), BridgeError> {
        single_database(args)?.disconnect()
    }

    /// `query(db, sql)`.
    pub fn query(&self, args: &[HostValue]) -> Result<Completion<Vec<Row>>, BridgeError> {
        let [db, sql] = args else {
            return Err(BridgeError::InvalidArgument(
                "expected exactly two arguments: database, query".to_string(),
            ));
        };

        let HostValue::String(sql) = sql else {
            return Err(BridgeError::InvalidArgument(
                "query must be a string".to_string(),
            ));
        };

        database(db)?.query(sql)
    }
}

fn single_database(args: &[HostValue]) -> Result<&Database, BridgeError> {
    match args {
        [db] => database(db),
        _ => Err(BridgeError::InvalidArgument(
            "expected exactly one argument: database".to_string(),
        )),
    }
}

fn database(value: &HostValue) -> Result<&Database, BridgeError> {
    match value {
        HostValue::Handle(db) => Ok(db),
        HostValue::Undefined | HostValue::Null => {
            Err(BridgeError::InvalidHandle("database not found".to_string()))
        }
        HostValue::String(_) => Err(BridgeError::InvalidArgument(
            "expected a database handle".to_string(),
        )),
    }
}
