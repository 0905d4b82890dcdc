//! PostgreSQL database session implementation

use crate::database::traits::{
    ensure_single_statement, CatalogQueries, DatabaseError, DatabaseSession,
};
use crate::schema::{Field, QueryOutput};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow, PgValueFormat};
use sqlx::{Column, Executor, PgPool, Row, Statement, TypeInfo, ValueRef};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Prefix of the private schema every session creates
pub const SCHEMA_PREFIX: &str = "sandbox_";

fn private_schema_name() -> String {
    format!("{SCHEMA_PREFIX}{}", Uuid::new_v4().simple())
}

/// Catalog queries over `information_schema` and `pg_catalog`
///
/// Every column is cast to text so that rows decode the same way as on the
/// other backends.
pub static POSTGRES_CATALOG: CatalogQueries = CatalogQueries {
    entities: r#"
        SELECT
            c.table_name::text AS table_name,
            c.column_name::text AS column_name,
            c.data_type::text AS data_type,
            c.udt_name::text AS udt_name,
            c.is_nullable::text AS is_nullable,
            CASE
                WHEN bool_or(tc.constraint_type = 'PRIMARY KEY') THEN 'PK'
                WHEN bool_or(tc.constraint_type = 'FOREIGN KEY') THEN 'FK'
            END AS attribute_key
        FROM information_schema.columns c
        JOIN information_schema.tables t
          ON t.table_schema = c.table_schema
         AND t.table_name = c.table_name
         AND t.table_type = 'BASE TABLE'
        LEFT JOIN information_schema.key_column_usage kcu
          ON kcu.table_schema = c.table_schema
         AND kcu.table_name = c.table_name
         AND kcu.column_name = c.column_name
        LEFT JOIN information_schema.table_constraints tc
          ON tc.constraint_schema = kcu.constraint_schema
         AND tc.constraint_name = kcu.constraint_name
         AND tc.table_name = kcu.table_name
        WHERE c.table_schema = $1
        GROUP BY c.table_name, c.column_name, c.data_type, c.udt_name, c.is_nullable, c.ordinal_position
        ORDER BY c.table_name, c.ordinal_position
    "#,
    relationships: r#"
        SELECT
            (child.table_name || '.' || rc.constraint_name)::text AS constraint_id,
            child.table_name::text AS child_table,
            child.column_name::text AS child_column,
            parent.table_name::text AS parent_table,
            parent.column_name::text AS parent_column
        FROM information_schema.referential_constraints rc
        JOIN information_schema.key_column_usage child
          ON child.constraint_schema = rc.constraint_schema
         AND child.constraint_name = rc.constraint_name
        JOIN information_schema.key_column_usage parent
          ON parent.constraint_schema = rc.unique_constraint_schema
         AND parent.constraint_name = rc.unique_constraint_name
         AND parent.ordinal_position = child.position_in_unique_constraint
        WHERE rc.constraint_schema = $1
        ORDER BY parent.table_name, child.table_name, rc.constraint_name, child.ordinal_position
    "#,
    indexes: r#"
        SELECT
            tablename::text AS table_name,
            indexname::text AS index_name
        FROM pg_catalog.pg_indexes
        WHERE schemaname = $1
        ORDER BY tablename, indexname
    "#,
};

/// Settings for new PostgreSQL sessions
#[derive(Debug, Clone)]
pub struct PostgresSessionOptions {
    /// Connection URL of the database the session runs in
    pub database_url: String,

    /// Pool size; introspection issues up to three queries at once
    pub max_connections: u32,
}

impl PostgresSessionOptions {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 3,
        }
    }
}

/// PostgreSQL database session
///
/// Each session owns a private schema (`sandbox_<uuid>`) in the database
/// named by [`PostgresSessionOptions::database_url`]. Every pooled
/// connection has its `search_path` set to that schema, and closing the
/// session drops it with everything the learner created.
pub struct PostgresSession {
    pool: PgPool,
    initialized: AtomicBool,
    schema_name: String,
}

impl PostgresSession {
    /// Convert a PostgreSQL row to positional JSON values
    fn row_to_values(row: &PgRow) -> Result<Vec<serde_json::Value>, DatabaseError> {
        let mut values = Vec::with_capacity(row.len());

        for (index, column) in row.columns().iter().enumerate() {
            let type_name = column.type_info().name();

            let value: serde_json::Value = match type_name {
                "BOOL" => {
                    let val: Option<bool> = row.try_get(index)?;
                    val.map(serde_json::Value::Bool).unwrap_or(serde_json::Value::Null)
                }
                "INT2" => {
                    let val: Option<i16> = row.try_get(index)?;
                    val.map(|v| serde_json::Value::Number(v.into())).unwrap_or(serde_json::Value::Null)
                }
                "INT4" => {
                    let val: Option<i32> = row.try_get(index)?;
                    val.map(|v| serde_json::Value::Number(v.into())).unwrap_or(serde_json::Value::Null)
                }
                "INT8" => {
                    let val: Option<i64> = row.try_get(index)?;
                    val.map(|v| serde_json::Value::Number(v.into())).unwrap_or(serde_json::Value::Null)
                }
                "FLOAT4" => {
                    let val: Option<f32> = row.try_get(index)?;
                    val.and_then(|v| serde_json::Number::from_f64(v as f64))
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
                "FLOAT8" => {
                    let val: Option<f64> = row.try_get(index)?;
                    val.and_then(serde_json::Number::from_f64)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
                "BYTEA" => {
                    let val: Option<Vec<u8>> = row.try_get(index)?;
                    val.map(|bytes| {
                        serde_json::Value::String(format!("[BLOB: {} bytes]", bytes.len()))
                    })
                    .unwrap_or(serde_json::Value::Null)
                }
                "JSON" | "JSONB" => {
                    let val: Option<serde_json::Value> = row.try_get(index)?;
                    val.unwrap_or(serde_json::Value::Null)
                }
                // Text, numerics, dates, uuids and user types keep the
                // server's own text rendering
                _ => Self::text_value(row, index, type_name)?,
            };

            values.push(value);
        }

        Ok(values)
    }

    fn text_value(
        row: &PgRow,
        index: usize,
        type_name: &str,
    ) -> Result<serde_json::Value, DatabaseError> {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(serde_json::Value::Null);
        }

        match raw.format() {
            PgValueFormat::Text => raw
                .as_str()
                .map(|text| serde_json::Value::String(text.to_string()))
                .map_err(|error| DatabaseError::Serialization(error.to_string())),
            PgValueFormat::Binary => row
                .try_get::<String, _>(index)
                .map(serde_json::Value::String)
                .map_err(|_| {
                    DatabaseError::Serialization(format!(
                        "cannot render binary value of type {type_name}"
                    ))
                }),
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }
}

#[async_trait]
impl DatabaseSession for PostgresSession {
    type Options = PostgresSessionOptions;

    async fn create(options: &Self::Options) -> Result<Self, DatabaseError> {
        let schema_name = private_schema_name();
        let search_path = format!("SET search_path TO {schema_name}");

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .after_connect(move |connection, _metadata| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    connection.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&options.database_url)
            .await?;

        sqlx::raw_sql(&format!("CREATE SCHEMA {schema_name}"))
            .execute(&pool)
            .await?;

        tracing::debug!(schema = %schema_name, "created postgres session");

        Ok(Self {
            pool,
            initialized: AtomicBool::new(false),
            schema_name,
        })
    }

    async fn exec(&self, ddl: &str) -> Result<(), DatabaseError> {
        sqlx::raw_sql(ddl).execute(&self.pool).await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, sql: &str, parameters: &[&str]) -> Result<QueryOutput, DatabaseError> {
        ensure_single_statement(sql)?;
        let mut connection = self.pool.acquire().await?;

        let prepared = (&mut *connection).prepare(sql).await?;
        let fields = prepared
            .columns()
            .iter()
            .map(|column| Field {
                name: column.name().to_string(),
            })
            .collect();

        // Without parameters the simple query protocol is used, which
        // returns every value in text format
        let rows = if parameters.is_empty() {
            (&mut *connection).fetch_all(sqlx::raw_sql(sql)).await?
        } else {
            let mut statement = sqlx::query(sql);
            for parameter in parameters {
                statement = statement.bind(parameter.to_string());
            }
            statement.fetch_all(&mut *connection).await?
        };

        let rows = rows
            .iter()
            .map(Self::row_to_values)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryOutput { fields, rows })
    }

    async fn close(&self) {
        if self.pool.is_closed() {
            return;
        }

        let drop_schema = format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema_name);
        if let Err(error) = sqlx::raw_sql(&drop_schema).execute(&self.pool).await {
            tracing::warn!(%error, schema = %self.schema_name, "could not drop session schema");
        }

        self.pool.close().await;
        tracing::debug!(schema = %self.schema_name, "closed postgres session");
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn catalog(&self) -> &'static CatalogQueries {
        &POSTGRES_CATALOG
    }

    fn default_schema(&self) -> &str {
        &self.schema_name
    }
}
