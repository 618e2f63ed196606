//! Result rows as ordered column → value records.

use serde::Serialize;
use std::fmt;

/// A single scalar returned by the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Exact numerics (`NUMERIC`, `DECIMAL`) kept in the engine's own text form.
    Decimal(String),
    /// Character data (`TEXT`, `VARCHAR`, `CHAR`, ...).
    Text(String),
    /// Any other type in its text form: dates, times, UUIDs, JSON, binary.
    Other(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SqlValue::Integer(_) | SqlValue::Float(_) | SqlValue::Decimal(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Float(f) => Some(*f),
            SqlValue::Decimal(d) => d.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("None"),
            SqlValue::Bool(true) => f.write_str("True"),
            SqlValue::Bool(false) => f.write_str("False"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            // Whole floats keep a trailing ".0" so 500.0 is not mistaken for an integer column.
            SqlValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{:.1}", v)
            }
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(d) => f.write_str(d),
            SqlValue::Text(s) | SqlValue::Other(s) => f.write_str(s),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

/// One returned row. Fields keep the driver's declared column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultRecord {
    fields: Vec<(String, SqlValue)>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.fields.push((column.into(), value));
    }

    /// Builds a record from column names and values, zipped positionally.
    pub fn from_columns(columns: &[String], values: Vec<SqlValue>) -> Self {
        Self {
            fields: columns.iter().cloned().zip(values).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, SqlValue)] {
        &self.fields
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for ResultRecord {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
