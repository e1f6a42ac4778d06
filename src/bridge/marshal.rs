//! Value marshaler.
//!
//! Converts a materialized native [`ResultSet`] into the host-facing value tree:
//! an ordered `Vec<Row>`, each row an insertion-ordered map from column name to
//! a scalar [`Value`].
//!
//! # Conversion
//!
//! | Native type                          | Value                          |
//! |--------------------------------------|--------------------------------|
//! | VARCHAR                              | `String`                       |
//! | TINYINT, SMALLINT, INTEGER, BIGINT   | `Number` (widened to `f64`)    |
//! | FLOAT, DOUBLE                        | `Number`                       |
//! | BOOLEAN                              | `Bool`                         |
//! | anything else                        | text rendering, else `Null`    |
//! | SQL NULL                             | `Null`                         |
//!
//! Integers are widened to `f64`, so BIGINT values beyond 2^53 lose precision.
//! Callers depend on numbers staying numbers, so this is a documented limit
//! rather than something to paper over.

use chrono::{NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value as NativeValue};
use indexmap::IndexMap;
use serde::Serialize;

use crate::bridge::BridgeError;
use crate::bridge::engine::ResultSet;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// One row: column name to value, in column order.
pub type Row = IndexMap<String, Value>;

/// A scalar in the value tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// =============================================================================
// Marshaling
// =============================================================================

/// Convert a result set into rows, preserving row and column order exactly.
///
/// Consumes the set, so the native cells are released once this returns.
/// Duplicate column names collapse into one key; the last column wins.
pub fn marshal(result: ResultSet) -> Result<Vec<Row>, BridgeError> {
    let (columns, time_zoned, native_rows) = result.into_parts();

    let mut rows = Vec::new();
    rows.try_reserve_exact(native_rows.len())?;

    for native_row in native_rows {
        let mut row = Row::with_capacity(columns.len());
        for ((name, zoned), cell) in columns.iter().zip(&time_zoned).zip(native_row) {
            let value = match cell {
                NativeValue::Timestamp(unit, v) if *zoned => {
                    render_timestamp_tz(unit, v).map_or(Value::Null, Value::String)
                }
                cell => convert(cell),
            };
            row.insert(name.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Convert one cell according to its native type.
pub fn convert(cell: NativeValue) -> Value {
    match cell {
        NativeValue::Null => Value::Null,
        NativeValue::Text(s) => Value::String(s),
        NativeValue::TinyInt(v) => Value::Number(f64::from(v)),
        NativeValue::SmallInt(v) => Value::Number(f64::from(v)),
        NativeValue::Int(v) => Value::Number(f64::from(v)),
        NativeValue::BigInt(v) => Value::Number(v as f64),
        NativeValue::Float(v) => Value::Number(f64::from(v)),
        NativeValue::Double(v) => Value::Number(v),
        NativeValue::Boolean(b) => Value::Bool(b),
        other => render_text(&other).map_or(Value::Null, Value::String),
    }
}

// =============================================================================
// Text Rendering
// =============================================================================

/// Best-effort VARCHAR-style rendering of a native value.
///
/// Follows DuckDB's own cast-to-text output where it is cheap to reproduce.
/// Returns `None` for NULL and for types with no text form.
pub fn render_text(value: &NativeValue) -> Option<String> {
    let text = match value {
        NativeValue::Null => return None,
        NativeValue::Boolean(b) => b.to_string(),
        NativeValue::TinyInt(v) => v.to_string(),
        NativeValue::SmallInt(v) => v.to_string(),
        NativeValue::Int(v) => v.to_string(),
        NativeValue::BigInt(v) => v.to_string(),
        NativeValue::HugeInt(v) => v.to_string(),
        NativeValue::UTinyInt(v) => v.to_string(),
        NativeValue::USmallInt(v) => v.to_string(),
        NativeValue::UInt(v) => v.to_string(),
        NativeValue::UBigInt(v) => v.to_string(),
        NativeValue::Float(v) => v.to_string(),
        NativeValue::Double(v) => v.to_string(),
        NativeValue::Decimal(d) => d.to_string(),
        NativeValue::Text(s) => s.clone(),
        NativeValue::Enum(s) => s.clone(),
        NativeValue::Blob(bytes) => render_blob(bytes),
        NativeValue::Date32(days) => render_date(*days)?,
        NativeValue::Time64(unit, v) => render_time(*unit, *v)?,
        NativeValue::Timestamp(unit, v) => render_timestamp(*unit, *v)?,
        NativeValue::Interval {
            months,
            days,
            nanos,
        } => render_interval(*months, *days, *nanos),
        NativeValue::List(items) | NativeValue::Array(items) => {
            let parts: Vec<String> = items.iter().map(render_nested).collect();
            format!("[{}]", parts.join(", "))
        }
        NativeValue::Struct(fields) => {
            let parts: Vec<String> = fields
                .keys()
                .zip(fields.values())
                .map(|(name, item)| format!("'{name}': {}", render_nested(item)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        NativeValue::Map(entries) => {
            let parts: Vec<String> = entries
                .keys()
                .zip(entries.values())
                .map(|(key, item)| format!("{}={}", render_nested(key), render_nested(item)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        NativeValue::Union(member) => return render_text(member),
        #[allow(unreachable_patterns)]
        other => {
            tracing::debug!(value = ?other, "No text rendering for native type");
            return None;
        }
    };
    Some(text)
}

/// Rendering of a value nested inside a list, struct or map.
fn render_nested(value: &NativeValue) -> String {
    render_text(value).unwrap_or_else(|| "NULL".to_string())
}

fn to_nanos(unit: TimeUnit, v: i64) -> i128 {
    let v = i128::from(v);
    match unit {
        TimeUnit::Second => v * 1_000_000_000,
        TimeUnit::Millisecond => v * 1_000_000,
        TimeUnit::Microsecond => v * 1_000,
        TimeUnit::Nanosecond => v,
    }
}

fn render_date(days: i32) -> Option<String> {
    let date = NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_DAYS_FROM_CE.checked_add(days)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn render_time(unit: TimeUnit, v: i64) -> Option<String> {
    let nanos = to_nanos(unit, v);
    let secs = u32::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let frac = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, frac)?;
    Some(time.format("%H:%M:%S%.f").to_string())
}

fn render_timestamp(unit: TimeUnit, v: i64) -> Option<String> {
    let nanos = to_nanos(unit, v);
    let secs = i64::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let frac = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    let ts = chrono::DateTime::from_timestamp(secs, frac)?;
    Some(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

/// TIMESTAMP WITH TIME ZONE, rendered in UTC with its offset.
fn render_timestamp_tz(unit: TimeUnit, v: i64) -> Option<String> {
    render_timestamp(unit, v).map(|ts| format!("{ts}+00"))
}

fn render_interval(months: i32, days: i32, nanos: i64) -> String {
    fn unit(n: i32, name: &str) -> String {
        if n.abs() == 1 {
            format!("{n} {name}")
        } else {
            format!("{n} {name}s")
        }
    }

    let mut parts = Vec::new();
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "month"));
    }
    if days != 0 {
        parts.push(unit(days, "day"));
    }
    if nanos != 0 || parts.is_empty() {
        let sign = if nanos < 0 { "-" } else { "" };
        let micros = (nanos / 1_000).unsigned_abs();
        let (secs, frac) = (micros / 1_000_000, micros % 1_000_000);
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if frac != 0 {
            clock.push_str(&format!(".{frac:06}"));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

fn render_blob(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (0x20..=0x7e).contains(&b) && b != b'\\' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("\\x{b:02X}"));
        }
    }
    out
}
