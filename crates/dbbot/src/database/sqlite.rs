//! SQLite backend on `rusqlite`. Statements run on the blocking pool.

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::{check_single_statement, ConnectOptions, DatabaseConnection, Dialect};
use crate::error::{ConnectionError, ExecutionError};
use crate::record::{ResultRecord, SqlValue};

pub struct SqliteConnection {
    conn: Option<Arc<Mutex<Connection>>>,
    interrupt: Arc<InterruptHandle>,
    statement_timeout: Duration,
}

impl SqliteConnection {
    /// Opens an existing database file. A missing file is a connection error, not a new database.
    pub async fn open(uri: &str, options: ConnectOptions) -> Result<Self, ConnectionError> {
        let path = uri
            .strip_prefix("sqlite://")
            .ok_or_else(|| ConnectionError(format!("Not a SQLite connection string: {}", uri)))?
            .to_string();

        let opened = tokio::task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| ConnectionError(format!("unable to open database file '{}': {}", path, e)))?;
            conn.busy_timeout(Duration::from_secs(5))
                .map_err(|e| ConnectionError(e.to_string()))?;
            // Opening is lazy; touching the schema proves the file is a readable database.
            conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
                .map_err(|e| ConnectionError(format!("'{}' is not a usable SQLite database: {}", path, e)))?;
            Ok::<_, ConnectionError>(conn)
        });

        let conn = tokio::time::timeout(options.connect_timeout, opened)
            .await
            .map_err(|_| ConnectionError(format!("connection timed out after {:?}", options.connect_timeout)))?
            .map_err(|e| ConnectionError(format!("connection task failed: {}", e)))??;

        let interrupt = Arc::new(conn.get_interrupt_handle());
        Ok(Self {
            conn: Some(Arc::new(Mutex::new(conn))),
            interrupt,
            statement_timeout: options.statement_timeout,
        })
    }

    /// Wraps an already-open connection.
    pub fn from_connection(conn: Connection, statement_timeout: Duration) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Some(Arc::new(Mutex::new(conn))),
            interrupt,
            statement_timeout,
        }
    }
}

fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<ResultRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(to_sql_value(row.get_ref(i)?));
        }
        records.push(ResultRecord::from_columns(&columns, values));
    }
    Ok(records)
}

fn to_sql_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Other(String::from_utf8_lossy(b).into_owned()),
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, sql: &str) -> Result<Vec<ResultRecord>, ExecutionError> {
        let conn = self
            .conn
            .clone()
            .ok_or_else(|| ExecutionError::new("connection is closed"))?;
        check_single_statement(sql)?;
        let statement = sql.to_string();
        let task = tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ExecutionError::new("connection lock poisoned"))?;
            run_statement(&guard, &statement).map_err(|e| ExecutionError::new(e.to_string()))
        });

        match tokio::time::timeout(self.statement_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ExecutionError::new(format!("statement task failed: {}", join_err))),
            Err(_) => {
                warn!("SQLite statement exceeded {:?}; interrupting", self.statement_timeout);
                self.interrupt.interrupt();
                Err(ExecutionError::new(format!(
                    "statement timed out after {}s",
                    self.statement_timeout.as_secs()
                )))
            }
        }
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            // A statement cut off by the timeout may still hold the other reference.
            if let Ok(mutex) = Arc::try_unwrap(conn) {
                if let Ok(conn) = mutex.into_inner() {
                    if let Err((_, e)) = conn.close() {
                        warn!("Error closing SQLite connection: {}", e);
                    }
                }
            }
            debug!("SQLite connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_db() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL, brand TEXT);
             INSERT INTO products (name, price, brand) VALUES ('Runner', 120.5, 'nike');
             INSERT INTO products (name, price, brand) VALUES ('Walker', 80.0, 'adidas');
             INSERT INTO products (name, price, brand) VALUES ('Trail', NULL, 'nike');",
        )
        .unwrap();
        file
    }

    fn uri_for(file: &tempfile::NamedTempFile) -> String {
        format!("sqlite://{}", file.path().display())
    }

    #[tokio::test]
    async fn test_execute_preserves_column_and_row_order() {
        let file = fixture_db();
        let mut conn = SqliteConnection::open(&uri_for(&file), ConnectOptions::default()).await.unwrap();

        let records = conn
            .execute("SELECT name, brand, price FROM products ORDER BY id")
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        let columns: Vec<&str> = records[0].columns().collect();
        assert_eq!(columns, vec!["name", "brand", "price"]);
        assert_eq!(records[0].get("name"), Some(&SqlValue::Text("Runner".into())));
        assert_eq!(records[1].get("price"), Some(&SqlValue::Float(80.0)));
        assert_eq!(records[2].get("price"), Some(&SqlValue::Null));
        conn.close().await;
    }

    #[tokio::test]
    async fn test_execution_error_is_verbatim() {
        let file = fixture_db();
        let mut conn = SqliteConnection::open(&uri_for(&file), ConnectOptions::default()).await.unwrap();

        let err = conn.execute("SELECT nmae FROM products").await.unwrap_err();
        assert!(err.message.contains("no such column: nmae"), "got: {}", err.message);
    }

    #[tokio::test]
    async fn test_empty_result_is_empty_vec() {
        let file = fixture_db();
        let mut conn = SqliteConnection::open(&uri_for(&file), ConnectOptions::default()).await.unwrap();
        let records = conn.execute("SELECT * FROM products WHERE id < 0").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("sqlite://{}", dir.path().join("absent.db").display());
        let result = SqliteConnection::open(&uri, ConnectOptions::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_multiple_statements_are_rejected() {
        let file = fixture_db();
        let mut conn = SqliteConnection::open(&uri_for(&file), ConnectOptions::default()).await.unwrap();

        let err = conn.execute("SELECT 1; SELECT 2").await.unwrap_err();
        assert!(err.message.contains("multiple statements"), "got: {}", err.message);

        let err = conn
            .execute("SELECT name FROM products; DELETE FROM products")
            .await
            .unwrap_err();
        assert!(err.message.contains("multiple statements"), "got: {}", err.message);
        let records = conn.execute("SELECT COUNT(*) AS n FROM products").await.unwrap();
        assert_eq!(records[0].get("n"), Some(&SqlValue::Integer(3)));
    }

    #[tokio::test]
    async fn test_blank_statement_is_execution_error() {
        let file = fixture_db();
        let mut conn = SqliteConnection::open(&uri_for(&file), ConnectOptions::default()).await.unwrap();

        let err = conn.execute("   ").await.unwrap_err();
        assert!(err.message.contains("empty statement"), "got: {}", err.message);
    }

    #[tokio::test]
    async fn test_runaway_statement_times_out_and_connection_recovers() {
        let file = fixture_db();
        let options = ConnectOptions {
            connect_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(1),
        };
        let mut conn = SqliteConnection::open(&uri_for(&file), options).await.unwrap();

        let err = conn
            .execute("WITH RECURSIVE r(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM r) SELECT COUNT(*) FROM r")
            .await
            .unwrap_err();
        assert!(err.message.contains("timed out"), "got: {}", err.message);

        let records = conn.execute("SELECT 1 AS one").await.unwrap();
        assert_eq!(records[0].get("one"), Some(&SqlValue::Integer(1)));
        conn.close().await;
    }

    #[tokio::test]
    async fn test_execute_after_close_fails() {
        let file = fixture_db();
        let mut conn = SqliteConnection::open(&uri_for(&file), ConnectOptions::default()).await.unwrap();
        conn.close().await;
        assert!(conn.execute("SELECT 1").await.is_err());
    }
}
