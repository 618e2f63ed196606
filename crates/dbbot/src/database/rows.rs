//! Dynamic row decoding for the `sqlx` backends.
//!
//! Statements go through the simple-query (text) protocol, so every non-null value
//! arrives as text and is typed from the column's declared type name.

use futures_util::{Stream, StreamExt};
use sqlx::{Column, ColumnIndex, Decode, Either, Row, TypeInfo, ValueRef};

use super::MULTIPLE_STATEMENTS;
use crate::error::ExecutionError;
use crate::record::{ResultRecord, SqlValue};

/// Broad value class of a column, derived from the engine's type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Decimal,
    Bool,
    /// Character types.
    Text,
    /// Everything else, kept as the engine's text form.
    Other,
}

impl ColumnKind {
    pub fn from_type_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        let base = upper.strip_suffix(" UNSIGNED").unwrap_or(&upper);
        match base {
            "INT2" | "INT4" | "INT8" | "OID" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT"
            | "INTEGER" | "BIGINT" | "YEAR" => ColumnKind::Integer,
            "FLOAT4" | "FLOAT8" | "FLOAT" | "DOUBLE" | "REAL" => ColumnKind::Float,
            "NUMERIC" | "DECIMAL" => ColumnKind::Decimal,
            "BOOL" | "BOOLEAN" => ColumnKind::Bool,
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" | "CHARACTER"
            | "CHARACTER VARYING" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
                ColumnKind::Text
            }
            _ => ColumnKind::Other,
        }
    }

    /// Types the text form of a value. Unparseable text is kept as an opaque value.
    pub fn parse(&self, text: String) -> SqlValue {
        match self {
            ColumnKind::Integer => match text.parse::<i64>() {
                Ok(i) => SqlValue::Integer(i),
                // Out of i64 range (BIGINT UNSIGNED): still a number.
                Err(_) if text.chars().all(|c| c.is_ascii_digit()) && !text.is_empty() => {
                    SqlValue::Decimal(text)
                }
                Err(_) => SqlValue::Other(text),
            },
            ColumnKind::Float => match text.parse::<f64>() {
                Ok(f) => SqlValue::Float(f),
                Err(_) => SqlValue::Other(text),
            },
            ColumnKind::Decimal => {
                if text.trim().parse::<f64>().is_ok() {
                    SqlValue::Decimal(text)
                } else {
                    SqlValue::Other(text)
                }
            }
            ColumnKind::Bool => match text.as_str() {
                "t" | "true" | "1" => SqlValue::Bool(true),
                "f" | "false" | "0" => SqlValue::Bool(false),
                _ => SqlValue::Other(text),
            },
            ColumnKind::Text => SqlValue::Text(text),
            ColumnKind::Other => SqlValue::Other(text),
        }
    }
}

/// Drains a `fetch_many` stream that must hold exactly one statement's result.
///
/// Anything arriving after the first statement summary means the text ran more than one
/// statement, which is reported as an execution error.
pub async fn collect_single_result<S, Q, R>(mut stream: S) -> Result<Vec<R>, ExecutionError>
where
    S: Stream<Item = Result<Either<Q, R>, sqlx::Error>> + Unpin,
{
    let mut rows = Vec::new();
    let mut finished = false;
    while let Some(item) = stream.next().await {
        let item = item.map_err(|e| ExecutionError::new(e.to_string()))?;
        if finished {
            return Err(ExecutionError::new(MULTIPLE_STATEMENTS));
        }
        match item {
            Either::Left(_) => finished = true,
            Either::Right(row) => rows.push(row),
        }
    }
    Ok(rows)
}

/// Converts driver rows into records, keeping column and row order.
pub fn decode_rows<R>(rows: &[R]) -> Vec<ResultRecord>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    rows.iter().map(decode_row).collect()
}

fn decode_row<R>(row: &R) -> ResultRecord
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    let mut record = ResultRecord::new();
    for (index, column) in row.columns().iter().enumerate() {
        let kind = ColumnKind::from_type_name(column.type_info().name());
        let is_null = row.try_get_raw(index).map(|v| v.is_null()).unwrap_or(true);
        let value = if is_null {
            SqlValue::Null
        } else {
            match row.try_get_unchecked::<String, _>(index) {
                Ok(text) => kind.parse(text),
                Err(_) => row
                    .try_get_unchecked::<Vec<u8>, _>(index)
                    .map(|bytes| SqlValue::Other(String::from_utf8_lossy(&bytes).into_owned()))
                    .unwrap_or(SqlValue::Null),
            }
        };
        record.push(column.name(), value);
    }
    record
}
