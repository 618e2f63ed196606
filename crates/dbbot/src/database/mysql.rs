//! MySQL backend on `sqlx`.

use async_trait::async_trait;
use sqlx::{Connection, Executor, MySqlConnection as SqlxMySqlConnection};
use tracing::{debug, warn};

use super::rows::{collect_single_result, decode_rows};
use super::{check_single_statement, ConnectOptions, DatabaseConnection, Dialect};
use crate::error::{ConnectionError, ExecutionError};
use crate::record::ResultRecord;

pub struct MySqlConnection {
    conn: Option<SqlxMySqlConnection>,
    options: ConnectOptions,
}

impl MySqlConnection {
    pub async fn open(uri: &str, options: ConnectOptions) -> Result<Self, ConnectionError> {
        let mut conn = tokio::time::timeout(options.connect_timeout, SqlxMySqlConnection::connect(uri))
            .await
            .map_err(|_| ConnectionError(format!("connection timed out after {:?}", options.connect_timeout)))?
            .map_err(|e| ConnectionError(e.to_string()))?;

        // Only bounds SELECTs, and MariaDB lacks the variable; the client-side timeout covers the rest.
        let set_timeout = format!(
            "SET SESSION max_execution_time = {}",
            options.statement_timeout.as_millis()
        );
        if let Err(e) = (&mut conn).execute(sqlx::raw_sql(&set_timeout)).await {
            debug!("Could not set max_execution_time: {}", e);
        }

        Ok(Self {
            conn: Some(conn),
            options,
        })
    }
}

#[async_trait]
impl DatabaseConnection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn execute(&mut self, sql: &str) -> Result<Vec<ResultRecord>, ExecutionError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| ExecutionError::new("connection is closed"))?;
        check_single_statement(sql)?;
        let backstop = self.options.statement_timeout + self.options.connect_timeout;
        let stream = conn.fetch_many(sqlx::raw_sql(sql));
        let rows = tokio::time::timeout(backstop, collect_single_result(stream))
            .await
            .map_err(|_| {
                ExecutionError::new(format!(
                    "statement timed out after {}s",
                    self.options.statement_timeout.as_secs()
                ))
            })??;
        Ok(decode_rows(&rows))
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                warn!("Error closing MySQL connection: {}", e);
            }
            debug!("MySQL connection closed");
        }
    }
}
