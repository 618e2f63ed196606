//! PostgreSQL backend on `sqlx`.

use async_trait::async_trait;
use sqlx::{Connection, Executor, PgConnection};
use tracing::{debug, warn};

use super::rows::{collect_single_result, decode_rows};
use super::{check_single_statement, ConnectOptions, DatabaseConnection, Dialect};
use crate::error::{ConnectionError, ExecutionError};
use crate::record::ResultRecord;

pub struct PostgresConnection {
    conn: Option<PgConnection>,
    options: ConnectOptions,
}

impl PostgresConnection {
    pub async fn open(uri: &str, options: ConnectOptions) -> Result<Self, ConnectionError> {
        let mut conn = tokio::time::timeout(options.connect_timeout, PgConnection::connect(uri))
            .await
            .map_err(|_| ConnectionError(format!("connection timed out after {:?}", options.connect_timeout)))?
            .map_err(|e| ConnectionError(e.to_string()))?;

        // Server-side bound; the client-side timeout in `execute` is only a backstop.
        let set_timeout = format!("SET statement_timeout = {}", options.statement_timeout.as_millis());
        if let Err(e) = (&mut conn).execute(sqlx::raw_sql(&set_timeout)).await {
            warn!("Could not set statement_timeout: {}", e);
        }

        Ok(Self {
            conn: Some(conn),
            options,
        })
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
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
                warn!("Error closing PostgreSQL connection: {}", e);
            }
            debug!("PostgreSQL connection closed");
        }
    }
}
