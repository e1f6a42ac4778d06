//! Bridge Integration Tests
//!
//! End-to-end coverage of the handle lifecycle, dispatch and marshaling
//! through the public API.

use duckbridge::config::DispatcherConfig;
use duckbridge::{
    BridgeError, Database, ErrorKind, EventLoop, Exports, HostValue, Row, Settled, Value,
};
use serde_json::json;
use tempfile::tempdir;

// =============================================================================
// Test Helpers
// =============================================================================

fn test_loop() -> EventLoop {
    EventLoop::new(&DispatcherConfig {
        worker_threads: 4,
        ..Default::default()
    })
    .expect("Failed to start event loop")
}

/// Open an in-memory database and connect it.
fn connected(event_loop: &EventLoop) -> Database {
    let db = Database::open(&event_loop.dispatcher(), None).expect("Failed to open database");
    event_loop
        .block_on(db.connect().expect("Failed to dispatch connect"))
        .expect("Failed to connect")
}

fn run(event_loop: &EventLoop, db: &Database, sql: &str) -> Result<Vec<Row>, BridgeError> {
    event_loop.block_on(db.query(sql)?)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_open_close_in_memory() {
    let event_loop = test_loop();
    let db = Database::open(&event_loop.dispatcher(), None).unwrap();
    assert!(db.path().is_none());
    db.close().unwrap();
    assert!(db.is_closed());
}

#[test]
fn test_open_close_file_backed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bridge.db");

    let event_loop = test_loop();
    let db = Database::open(&event_loop.dispatcher(), Some(path.as_path())).unwrap();
    assert_eq!(db.path(), Some(path.as_path()));
    db.close().unwrap();

    assert!(path.exists());
}

#[test]
fn test_open_failure_reports_engine_message() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no").join("such").join("dir.db");

    let event_loop = test_loop();
    let err = Database::open(&event_loop.dispatcher(), Some(path.as_path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OpenFailed);
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_file_backed_data_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("persist.db");
    let event_loop = test_loop();

    {
        let db = event_loop
            .block_on(Database::create(&event_loop.dispatcher(), Some(path.as_path())).unwrap())
            .unwrap();
        run(&event_loop, &db, "CREATE TABLE notes(body VARCHAR)").unwrap();
        run(&event_loop, &db, "INSERT INTO notes VALUES ('kept')").unwrap();
        db.close().unwrap();
    }

    let db = event_loop
        .block_on(Database::create(&event_loop.dispatcher(), Some(path.as_path())).unwrap())
        .unwrap();
    let rows = run(&event_loop, &db, "SELECT body FROM notes").unwrap();
    assert_eq!(rows[0]["body"], Value::from("kept"));
    db.close().unwrap();
}

#[test]
fn test_query_before_connect_never_dispatches() {
    let event_loop = test_loop();
    let dispatcher = event_loop.dispatcher();
    let db = Database::open(&dispatcher, None).unwrap();

    let err = db.query("SELECT 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHandle);
    assert!(err.to_string().contains("connect"));
    assert_eq!(dispatcher.pending(), 0);
}

#[test]
fn test_connect_twice_replaces_connection() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    run(&event_loop, &db, "CREATE TABLE t(a INTEGER)").unwrap();
    let again = event_loop.block_on(db.connect().unwrap()).unwrap();
    assert!(again.same_handle(&db));

    // The new connection sees the same database.
    run(&event_loop, &db, "INSERT INTO t VALUES (7)").unwrap();
    let rows = run(&event_loop, &db, "SELECT a FROM t").unwrap();
    assert_eq!(rows, vec![Row::from([("a".to_string(), Value::Number(7.0))])]);
}

#[test]
fn test_disconnect_and_reconnect() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    db.disconnect().unwrap();
    assert!(!db.is_connected());
    assert_eq!(db.query("SELECT 1").unwrap_err().kind(), ErrorKind::InvalidHandle);

    event_loop.block_on(db.connect().unwrap()).unwrap();
    assert_eq!(run(&event_loop, &db, "SELECT 1 AS one").unwrap().len(), 1);
}

#[test]
fn test_closed_handle_rejects_everything() {
    let event_loop = test_loop();
    let db = connected(&event_loop);
    db.close().unwrap();

    assert_eq!(db.query("SELECT 1").unwrap_err(), BridgeError::InvalidHandle("database is closed".into()));
    assert_eq!(db.connect().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(db.disconnect().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(db.close().unwrap_err().kind(), ErrorKind::InvalidHandle);
}

#[test]
fn test_close_after_query_settles_cleanly() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    let completion = db.query("SELECT SUM(i) AS s FROM range(100000) t(i)").unwrap();
    db.close().unwrap();

    // Close either waited for the query or ran first; the query never sees a torn connection.
    match event_loop.block_on(completion) {
        Ok(rows) => assert_eq!(rows[0]["s"], Value::from("4999950000")),
        Err(e) => assert_eq!(e, BridgeError::InvalidHandle("database is closed".into())),
    }
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_table_round_trip() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    run(&event_loop, &db, "CREATE TABLE t(a INTEGER, b VARCHAR)").unwrap();
    run(&event_loop, &db, "INSERT INTO t VALUES (1, 'x'), (2, NULL)").unwrap();
    let rows = run(&event_loop, &db, "SELECT a, b FROM t ORDER BY a").unwrap();

    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([{"a": 1.0, "b": "x"}, {"a": 2.0, "b": null}])
    );
}

#[test]
fn test_columns_keep_schema_order() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    let rows = run(&event_loop, &db, "SELECT 3 AS z, 2 AS a, 1 AS m").unwrap();
    let names: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(names, ["z", "a", "m"]);
    assert_eq!(
        serde_json::to_string(&rows).unwrap(),
        r#"[{"z":3.0,"a":2.0,"m":1.0}]"#
    );
}

#[test]
fn test_scalar_types() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    let rows = run(
        &event_loop,
        &db,
        "SELECT true AS t, 1.5::DOUBLE AS d, -3::TINYINT AS i, \
         NULL::INTEGER AS n, NULL::BOOLEAN AS nb, DATE '2024-01-01' AS day",
    )
    .unwrap();

    let row = &rows[0];
    assert_eq!(row["t"], Value::Bool(true));
    assert_eq!(row["d"], Value::Number(1.5));
    assert_eq!(row["i"], Value::Number(-3.0));
    assert!(row["n"].is_null());
    assert!(row["nb"].is_null());
    assert_eq!(row["day"], Value::from("2024-01-01"));
}

#[test]
fn test_nested_and_zoned_types_render_as_text() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    let rows = run(
        &event_loop,
        &db,
        "SELECT {'x': 1} AS s, MAP {'k': 2} AS m, [1, NULL, 3] AS l, \
         TIMESTAMPTZ '2024-01-01 00:00:00+00' AS tz",
    )
    .unwrap();

    let row = &rows[0];
    assert_eq!(row["s"], Value::from("{'x': 1}"));
    assert_eq!(row["m"], Value::from("{k=2}"));
    assert_eq!(row["l"], Value::from("[1, NULL, 3]"));
    assert_eq!(row["tz"], Value::from("2024-01-01 00:00:00+00"));
}

#[test]
fn test_empty_result() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    run(&event_loop, &db, "CREATE TABLE empty(a INTEGER)").unwrap();
    let rows = run(&event_loop, &db, "SELECT * FROM empty").unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_invalid_sql_then_valid() {
    let event_loop = test_loop();
    let db = connected(&event_loop);

    let err = run(&event_loop, &db, "SELEC nonsense").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailed);
    assert!(!err.to_string().is_empty());

    let rows = run(&event_loop, &db, "SELECT 'still fine' AS s").unwrap();
    assert_eq!(rows[0]["s"], Value::from("still fine"));
}

#[test]
fn test_concurrent_queries_on_one_handle() {
    let event_loop = test_loop();
    let dispatcher = event_loop.dispatcher();
    let db = connected(&event_loop);

    let first = db.query("SELECT 3 + 3 AS value").unwrap();
    let second = db.query("SELECT 'hello' AS text").unwrap();
    assert_eq!(dispatcher.pending(), 2);

    let (first, second) = event_loop.block_on(async { (first.await, second.await) });
    assert_eq!(first.unwrap()[0]["value"], Value::Number(6.0));
    assert_eq!(second.unwrap()[0]["text"], Value::from("hello"));
    assert_eq!(dispatcher.pending(), 0);
}

#[test]
fn test_queries_on_separate_handles() {
    let event_loop = test_loop();
    let left = connected(&event_loop);
    let right = connected(&event_loop);

    let a = left.query("SELECT 1 AS side").unwrap();
    let b = right.query("SELECT 2 AS side").unwrap();
    let (a, b) = event_loop.block_on(async { (a.await, b.await) });

    assert_eq!(a.unwrap()[0]["side"], Value::Number(1.0));
    assert_eq!(b.unwrap()[0]["side"], Value::Number(2.0));
}

#[test]
fn test_queue_capacity_rejects_overflow() {
    let event_loop = EventLoop::new(&DispatcherConfig {
        worker_threads: 1,
        queue_capacity: 1,
        ..Default::default()
    })
    .unwrap();
    let db = connected(&event_loop);

    let accepted = db.query("SELECT 1").unwrap();
    let rejected = db.query("SELECT 2").unwrap();
    let (accepted, rejected) = event_loop.block_on(async { (accepted.await, rejected.await) });

    assert!(accepted.is_ok());
    assert_eq!(rejected.unwrap_err().kind(), ErrorKind::SchedulerFailed);
}

#[test]
fn test_queue_capacity_spans_handles() {
    let event_loop = EventLoop::new(&DispatcherConfig {
        worker_threads: 2,
        queue_capacity: 1,
        ..Default::default()
    })
    .unwrap();
    let left = connected(&event_loop);
    let right = connected(&event_loop);

    let accepted = left.query("SELECT 1 AS side").unwrap();
    assert_eq!(right.dispatcher().pending(), 1);
    let rejected = right.query("SELECT 2 AS side").unwrap();
    let (accepted, rejected) = event_loop.block_on(async { (accepted.await, rejected.await) });

    assert_eq!(accepted.unwrap()[0]["side"], Value::Number(1.0));
    assert_eq!(rejected.unwrap_err().kind(), ErrorKind::SchedulerFailed);
    assert_eq!(event_loop.dispatcher().pending(), 0);
}

// =============================================================================
// Host Exports
// =============================================================================

#[test]
fn test_exports_full_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exports.db");
    let event_loop = test_loop();
    let exports = Exports::new(event_loop.dispatcher());

    let db = exports
        .call("open", &[HostValue::String(path.to_string_lossy().into_owned())])
        .unwrap()
        .into_handle()
        .unwrap();
    let handle = HostValue::Handle(db);

    let promise = exports.call("connect", &[handle.clone()]).unwrap();
    let settled = event_loop.block_on(promise.into_promise().unwrap()).unwrap();
    assert!(matches!(settled, Settled::Handle(_)));

    let promise = exports
        .call("query", &[handle.clone(), "SELECT 4 + 4 AS value".into()])
        .unwrap();
    let rows = event_loop
        .block_on(promise.into_promise().unwrap())
        .unwrap()
        .into_rows()
        .unwrap();
    assert_eq!(rows[0]["value"], Value::Number(8.0));

    exports.call("close", &[handle.clone()]).unwrap();
    let err = exports.call("close", &[handle]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHandle);
}

#[test]
fn test_exports_rejection_carries_message() {
    let event_loop = test_loop();
    let exports = Exports::new(event_loop.dispatcher());

    let db = exports.open(&[]).unwrap();
    event_loop.block_on(db.connect().unwrap()).unwrap();

    let promise = exports
        .call("query", &[db.into(), "SELECT * FROM nowhere".into()])
        .unwrap();
    let err = event_loop
        .block_on(promise.into_promise().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailed);
    assert!(err.to_string().to_lowercase().contains("nowhere"));
}
