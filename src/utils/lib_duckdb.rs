use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use duckdb::{params_from_iter, types::Value, AccessMode, Config, Connection, Row};
use itertools::Itertools;
use jiff::{
    civil::{date, Date},
    ToSpan,
};
use log::{debug, warn};
use rust_decimal::Decimal;

use crate::db::query::Statement;
use crate::interval::date::{format_dmy, parse_date};

/// Exponential backoff: wait `initial_wait`, then twice that, and so on until
/// `max_attempts` calls have failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 8,
            initial_wait: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn never() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            initial_wait: Duration::ZERO,
        }
    }

    pub fn run<T, E: Display>(
        &self,
        what: &str,
        mut f: impl FnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let mut attempts = 0;
        let mut wait_duration = self.initial_wait;
        loop {
            match f() {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        return Err(e);
                    }
                    warn!(
                        "Retrying {} after error: {} (attempt {}/{})",
                        what, e, attempts, self.max_attempts
                    );
                    std::thread::sleep(wait_duration);
                    wait_duration *= 2;
                }
            }
        }
    }
}

pub trait WithRetry {
    /// Use this function when you have an `execute_batch` statement which may
    /// collide with another process holding the database.
    fn execute_batch_with_retry(&self, sql: &str, policy: &RetryPolicy)
        -> Result<(), duckdb::Error>;
}

impl WithRetry for Connection {
    fn execute_batch_with_retry(
        &self,
        sql: &str,
        policy: &RetryPolicy,
    ) -> Result<(), duckdb::Error> {
        policy.run("DuckDB execute_batch", || self.execute_batch(sql))
    }
}

/// Open a DuckDB connection, retrying while the file is locked by another writer.
pub fn open_with_retry(
    duckdb_path: &str,
    policy: &RetryPolicy,
    read_only: bool,
) -> Result<Connection, duckdb::Error> {
    policy.run("DuckDB open", || {
        let access_mode = if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        let config = Config::default().access_mode(access_mode)?;
        Connection::open_with_flags(duckdb_path, config)
    })
}

/// Run the statements one after the other and concatenate the mapped rows,
/// keeping the order of the statements.  Statements are executed in their
/// parameterized form.
pub fn fetch_all<T, F>(
    conn: &Connection,
    statements: &[Statement],
    mut f: F,
) -> Result<Vec<T>, duckdb::Error>
where
    F: FnMut(&Row<'_>) -> duckdb::Result<T>,
{
    let mut out: Vec<T> = Vec::new();
    for statement in statements {
        debug!("{}", statement);
        let mut stmt = conn.prepare(statement.template())?;
        let rows = stmt.query_map(params_from_iter(statement.params()), |row| f(row))?;
        for row in rows {
            out.push(row?);
        }
    }
    Ok(out)
}

/// Untyped query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|e| e == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

/// Like [`fetch_all`] but keeps every column.  All statements must return the
/// same columns, which holds for shards of one table.
pub fn fetch_frame(conn: &Connection, statements: &[Statement]) -> Result<Frame, Box<dyn Error>> {
    let mut frame = Frame::default();
    for (i, statement) in statements.iter().enumerate() {
        debug!("{}", statement);
        let mut stmt = conn.prepare(statement.template())?;
        let mut rows = stmt.query(params_from_iter(statement.params()))?;
        let columns = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();
        if i == 0 {
            frame.columns = columns;
        } else if columns != frame.columns {
            return Err(format!(
                "shard {} returned columns [{}], expected [{}]",
                statement.shard(),
                columns.join(", "),
                frame.columns.join(", ")
            )
            .into());
        }
        while let Some(row) = rows.next()? {
            let values = (0..frame.columns.len())
                .map(|j| row.get::<_, Value>(j))
                .collect::<Result<Vec<Value>, _>>()?;
            frame.rows.push(values);
        }
    }
    Ok(frame)
}

pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(v) | Value::Enum(v) => Some(v.clone()),
        _ => Some(value_to_string(value)),
    }
}

pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(v) => Some(*v as i64),
        Value::SmallInt(v) => Some(*v as i64),
        Value::Int(v) => Some(*v as i64),
        Value::BigInt(v) => Some(*v),
        Value::UTinyInt(v) => Some(*v as i64),
        Value::USmallInt(v) => Some(*v as i64),
        Value::UInt(v) => Some(*v as i64),
        Value::UBigInt(v) => i64::try_from(*v).ok(),
        Value::Text(v) => v.trim().parse().ok(),
        _ => None,
    }
}

pub fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(v) => Some(*v),
        Value::Double(v) => Decimal::try_from(*v).ok(),
        Value::Float(v) => Decimal::try_from(*v).ok(),
        Value::Text(v) => Decimal::from_str(v.trim()).ok(),
        _ => value_as_i64(value).map(Decimal::from),
    }
}

/// DuckDB `DATE` columns, or text in any format [`parse_date`] understands.
pub fn value_as_date(value: &Value) -> Option<Date> {
    match value {
        Value::Date32(days) => date(1970, 1, 1).checked_add((*days).days()).ok(),
        Value::Text(v) => parse_date(v).ok(),
        _ => None,
    }
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "".to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Text(v) | Value::Enum(v) => v.clone(),
        Value::Decimal(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Date32(_) => value_as_date(value).map(format_dmy).unwrap_or_default(),
        Value::List(vs) => format!("[{}]", vs.iter().map(value_to_string).join(", ")),
        _ => match value_as_i64(value) {
            Some(v) => v.to_string(),
            None => format!("{:?}", value),
        },
    }
}
