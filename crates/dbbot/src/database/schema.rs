//! Schema text used to ground generated SQL.
//!
//! Each table is rendered as a `CREATE TABLE` statement followed by a comment block with
//! a few sample rows. SQLite keeps its original DDL; PostgreSQL and MySQL tables are
//! rebuilt from `information_schema.columns`. Nothing is cached: a chat turn always sees
//! the schema as it is now.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{DatabaseConnection, Dialect};
use crate::error::ConnectionError;
use crate::record::{ResultRecord, SqlValue};

const SQLITE_TABLES: &str = "SELECT name, sql FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

const POSTGRES_COLUMNS: &str = "SELECT table_name, column_name, data_type, is_nullable \
     FROM information_schema.columns WHERE table_schema = current_schema() \
     ORDER BY table_name, ordinal_position";

const MYSQL_COLUMNS: &str = "SELECT table_name AS table_name, column_name AS column_name, \
     column_type AS data_type, is_nullable AS is_nullable \
     FROM information_schema.columns WHERE table_schema = DATABASE() \
     ORDER BY table_name, ordinal_position";

#[derive(Debug, Clone)]
struct ColumnInfo {
    name: String,
    data_type: String,
    nullable: bool,
}

#[derive(Debug, Clone)]
struct TableInfo {
    name: String,
    ddl: String,
}

pub struct SchemaIntrospector {
    sample_rows: usize,
}

impl SchemaIntrospector {
    pub fn new(sample_rows: usize) -> Self {
        Self { sample_rows }
    }

    /// Describes every user table reachable through `conn`.
    pub async fn describe(&self, conn: &mut dyn DatabaseConnection) -> Result<String, ConnectionError> {
        let dialect = conn.dialect();
        let tables = match dialect {
            Dialect::Sqlite => sqlite_tables(conn).await?,
            Dialect::Postgresql => information_schema_tables(conn, POSTGRES_COLUMNS).await?,
            Dialect::Mysql => information_schema_tables(conn, MYSQL_COLUMNS).await?,
        };
        debug!("Introspected {} tables ({})", tables.len(), dialect);

        let mut sections = Vec::with_capacity(tables.len());
        for table in &tables {
            let mut section = table.ddl.trim_end().to_string();
            if self.sample_rows > 0 {
                match self.sample(conn, dialect, &table.name).await {
                    Some(sample) => {
                        section.push_str("\n\n");
                        section.push_str(&sample);
                    }
                    None => warn!("Skipping sample rows for table {}", table.name),
                }
            }
            sections.push(section);
        }
        Ok(sections.join("\n\n"))
    }

    async fn sample(&self, conn: &mut dyn DatabaseConnection, dialect: Dialect, table: &str) -> Option<String> {
        let sql = format!("SELECT * FROM {} LIMIT {}", dialect.quote_ident(table), self.sample_rows);
        let records = conn.execute(&sql).await.ok()?;
        Some(render_sample(table, self.sample_rows, &records))
    }
}

fn render_sample(table: &str, limit: usize, records: &[ResultRecord]) -> String {
    let mut out = format!("/*\n{} rows from {} table:\n", limit, table);
    if let Some(first) = records.first() {
        out.push_str(&first.columns().collect::<Vec<_>>().join("\t"));
        out.push('\n');
    }
    for record in records {
        let cells: Vec<String> = record.values().map(|v| v.to_string()).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out.push_str("*/");
    out
}

fn text_at(record: &ResultRecord, index: usize) -> Option<String> {
    match record.fields().get(index).map(|(_, v)| v) {
        Some(SqlValue::Null) | None => None,
        Some(value) => Some(value.to_string()),
    }
}

async fn sqlite_tables(conn: &mut dyn DatabaseConnection) -> Result<Vec<TableInfo>, ConnectionError> {
    let records = conn
        .execute(SQLITE_TABLES)
        .await
        .map_err(|e| ConnectionError(format!("Failed to read schema: {}", e)))?;
    Ok(records
        .iter()
        .filter_map(|r| {
            let name = text_at(r, 0)?;
            let ddl = text_at(r, 1).unwrap_or_else(|| format!("CREATE TABLE {} ()", name));
            Some(TableInfo { name, ddl })
        })
        .collect())
}

async fn information_schema_tables(
    conn: &mut dyn DatabaseConnection,
    query: &str,
) -> Result<Vec<TableInfo>, ConnectionError> {
    let records = conn
        .execute(query)
        .await
        .map_err(|e| ConnectionError(format!("Failed to read schema: {}", e)))?;

    let mut tables: BTreeMap<String, Vec<ColumnInfo>> = BTreeMap::new();
    for record in &records {
        let (Some(table), Some(column)) = (text_at(record, 0), text_at(record, 1)) else {
            continue;
        };
        tables.entry(table).or_default().push(ColumnInfo {
            name: column,
            data_type: text_at(record, 2).unwrap_or_default(),
            nullable: text_at(record, 3).map(|v| v.eq_ignore_ascii_case("YES")).unwrap_or(true),
        });
    }

    Ok(tables
        .into_iter()
        .map(|(name, columns)| {
            let ddl = render_create_table(&name, &columns);
            TableInfo { name, ddl }
        })
        .collect())
}

fn render_create_table(table: &str, columns: &[ColumnInfo]) -> String {
    let body: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut line = format!("\t{} {}", c.name, c.data_type.to_uppercase());
            if !c.nullable {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect();
    format!("CREATE TABLE {} (\n{}\n)", table, body.join(",\n"))
}
