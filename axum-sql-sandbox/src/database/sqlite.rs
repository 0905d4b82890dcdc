//! SQLite database session implementation
//!
//! Every session is its own in-memory database. The pool holds exactly one
//! connection that never idles out, because the database disappears with
//! its last connection.

use crate::database::traits::{
    ensure_single_statement, CatalogQueries, DatabaseError, DatabaseSession,
};
use crate::schema::{Field, QueryOutput};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Sqlite, SqlitePool, Statement, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Virtual machine instructions between two checks of the interrupt flag
const PROGRESS_CHECK_INSTRUCTIONS: i32 = 1_000;

/// Schema name of the main SQLite database
pub const DEFAULT_SCHEMA: &str = "main";

/// Catalog queries built on the SQLite table-valued pragma functions
pub static SQLITE_CATALOG: CatalogQueries = CatalogQueries {
    entities: r#"
        SELECT
            t.name AS table_name,
            c.name AS column_name,
            COALESCE(NULLIF(c.type, ''), 'BLOB') AS data_type,
            COALESCE(NULLIF(c.type, ''), 'BLOB') AS udt_name,
            CASE WHEN c."notnull" = 0 AND c.pk = 0 THEN 'YES' ELSE 'NO' END AS is_nullable,
            CASE
                WHEN c.pk > 0 THEN 'PK'
                WHEN EXISTS (
                    SELECT 1
                    FROM pragma_foreign_key_list(t.name, t.schema) AS f
                    WHERE f."from" = c.name
                ) THEN 'FK'
            END AS attribute_key
        FROM pragma_table_list AS t
        JOIN pragma_table_info(t.name, t.schema) AS c
        WHERE t.schema = ?1
          AND t.type = 'table'
          AND t.name NOT GLOB 'sqlite_*'
        ORDER BY t.name, c.cid
    "#,
    relationships: r#"
        SELECT
            t.name || '.' || f.id AS constraint_id,
            t.name AS child_table,
            f."from" AS child_column,
            f."table" AS parent_table,
            COALESCE(
                f."to",
                (
                    SELECT p.name
                    FROM pragma_table_info(f."table", t.schema) AS p
                    WHERE p.pk = f.seq + 1
                )
            ) AS parent_column
        FROM pragma_table_list AS t
        JOIN pragma_foreign_key_list(t.name, t.schema) AS f
        WHERE t.schema = ?1
          AND t.type = 'table'
          AND t.name NOT GLOB 'sqlite_*'
        ORDER BY f."table", t.name, f.id, f.seq
    "#,
    indexes: r#"
        SELECT
            t.name AS table_name,
            i.name AS index_name
        FROM pragma_table_list AS t
        JOIN pragma_index_list(t.name, t.schema) AS i
        WHERE t.schema = ?1
          AND t.type = 'table'
          AND t.name NOT GLOB 'sqlite_*'
        ORDER BY t.name, i.name
    "#,
};

/// Settings for new SQLite sessions
#[derive(Debug, Clone)]
pub struct SqliteSessionOptions {
    /// Enforce foreign-key constraints (SQLite leaves them off by default)
    pub foreign_keys: bool,
}

impl Default for SqliteSessionOptions {
    fn default() -> Self {
        Self { foreign_keys: true }
    }
}

/// In-memory SQLite database session
pub struct SqliteSession {
    pool: SqlitePool,
    initialized: AtomicBool,
    interrupted: Arc<AtomicBool>,
}

impl SqliteSession {
    /// Check out the session's connection once it is idle
    ///
    /// Locking the handle queues behind any statement still running on the
    /// connection's worker, so an interrupted statement has stopped before
    /// the flag is cleared.
    async fn acquire(&self) -> Result<PoolConnection<Sqlite>, DatabaseError> {
        let mut connection = self.pool.acquire().await?;
        drop(connection.lock_handle().await?);
        self.interrupted.store(false, Ordering::Release);
        Ok(connection)
    }

    /// Convert a SQLite row to positional JSON values
    fn row_to_values(row: &SqliteRow) -> Result<Vec<Value>, DatabaseError> {
        (0..row.len())
            .map(|index| Self::extract_column_value(row, index))
            .collect()
    }

    /// Extract a column value from a SQLite row and convert to JSON
    fn extract_column_value(row: &SqliteRow, index: usize) -> Result<Value, DatabaseError> {
        if row
            .try_get_raw(index)
            .map_err(|error| DatabaseError::Serialization(error.to_string()))?
            .is_null()
        {
            return Ok(Value::Null);
        }

        // Declared types are only a hint: SQLite stores whatever it was given
        let type_name = row.column(index).type_info().name();
        match type_name {
            "INTEGER" | "BIGINT" | "INT" => {
                if let Ok(value) = row.try_get::<i64, _>(index) {
                    return Ok(Value::Number(value.into()));
                }
            }
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
                if let Ok(value) = row.try_get::<f64, _>(index) {
                    if let Some(number) = serde_json::Number::from_f64(value) {
                        return Ok(Value::Number(number));
                    }
                }
            }
            "BOOLEAN" | "BOOL" => {
                if let Ok(value) = row.try_get::<bool, _>(index) {
                    return Ok(Value::Bool(value));
                }
            }
            _ => {
                if let Ok(value) = row.try_get::<String, _>(index) {
                    return Ok(Value::String(value));
                }
            }
        }

        // Fallback: try common storage classes in order
        if let Ok(value) = row.try_get::<i64, _>(index) {
            return Ok(Value::Number(value.into()));
        }
        if let Ok(value) = row.try_get::<f64, _>(index) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                return Ok(Value::Number(number));
            }
        }
        if let Ok(value) = row.try_get::<String, _>(index) {
            return Ok(Value::String(value));
        }
        if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
            return Ok(Value::String(format!("[BLOB: {} bytes]", value.len())));
        }

        Err(DatabaseError::Serialization(format!(
            "unsupported value in column {} of type {}",
            row.column(index).name(),
            type_name
        )))
    }
}

#[async_trait]
impl DatabaseSession for SqliteSession {
    type Options = SqliteSessionOptions;

    async fn create(options: &Self::Options) -> Result<Self, DatabaseError> {
        let connect_options =
            SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(options.foreign_keys);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        // The pool's only connection lives as long as the session, so the
        // handler is installed once
        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let mut connection = pool.acquire().await?;
            let mut handle = connection.lock_handle().await?;
            let flag = interrupted.clone();
            handle.set_progress_handler(PROGRESS_CHECK_INSTRUCTIONS, move || {
                !flag.load(Ordering::Acquire)
            });
        }

        tracing::debug!("created in-memory sqlite session");

        Ok(Self {
            pool,
            initialized: AtomicBool::new(false),
            interrupted,
        })
    }

    async fn exec(&self, ddl: &str) -> Result<(), DatabaseError> {
        let mut connection = self.acquire().await?;
        (&mut *connection).execute(sqlx::raw_sql(ddl)).await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, sql: &str, parameters: &[&str]) -> Result<QueryOutput, DatabaseError> {
        ensure_single_statement(sql)?;
        let mut connection = self.acquire().await?;

        // Columns come from the prepared statement so that a SELECT without
        // rows still reports its fields
        let prepared = (&mut *connection).prepare(sql).await?;
        let fields = prepared
            .columns()
            .iter()
            .map(|column| Field {
                name: column.name().to_string(),
            })
            .collect();

        let mut statement = sqlx::query(sql);
        for parameter in parameters {
            statement = statement.bind(parameter.to_string());
        }

        let rows = statement.fetch_all(&mut *connection).await?;
        let rows = rows
            .iter()
            .map(Self::row_to_values)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryOutput { fields, rows })
    }

    async fn close(&self) {
        self.interrupt();
        self.pool.close().await;
        tracing::debug!("closed sqlite session");
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn catalog(&self) -> &'static CatalogQueries {
        &SQLITE_CATALOG
    }

    fn default_schema(&self) -> &str {
        DEFAULT_SCHEMA
    }
}
