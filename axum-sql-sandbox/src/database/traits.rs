//! Database session trait
//!
//! This trait defines the interface that every sandbox database backend must
//! provide.

use crate::database::statements::count_statements;
use crate::schema::QueryOutput;
use async_trait::async_trait;
use thiserror::Error;

/// Catalog queries a backend answers for schema introspection
///
/// Each query takes the schema name as its only parameter and must return
/// the same positional columns on every backend:
///
/// * `entities`: `table_name, column_name, data_type, udt_name, is_nullable ('YES'|'NO'), attribute_key ('PK'|'FK'|NULL)`
/// * `relationships`: `constraint_id, child_table, child_column, parent_table, parent_column`
/// * `indexes`: `table_name, index_name`
#[derive(Debug, Clone, Copy)]
pub struct CatalogQueries {
    pub entities: &'static str,
    pub relationships: &'static str,
    pub indexes: &'static str,
}

/// An isolated database session that a schema is loaded into
///
/// A session is created empty, receives schema DDL through [`exec`], answers
/// queries through [`query`] and is released with [`close`]. After closing,
/// every further call fails.
///
/// [`exec`]: DatabaseSession::exec
/// [`query`]: DatabaseSession::query
/// [`close`]: DatabaseSession::close
#[async_trait]
pub trait DatabaseSession: Send + Sync + 'static {
    /// Backend specific settings needed to create a session
    type Options: Clone + Send + Sync + 'static;

    /// Create a new, empty session
    async fn create(options: &Self::Options) -> Result<Self, DatabaseError>
    where
        Self: Sized;

    /// Execute schema DDL (may contain several statements)
    ///
    /// On success the session counts as initialized.
    async fn exec(&self, ddl: &str) -> Result<(), DatabaseError>;

    /// Execute a single statement and return its result in positional form
    ///
    /// Text holding more than one statement is rejected with
    /// [`DatabaseError::MultipleStatements`].
    ///
    /// # Arguments
    ///
    /// * `sql` - Statement to execute
    /// * `parameters` - Values bound to the statement's placeholders, in order
    async fn query(&self, sql: &str, parameters: &[&str]) -> Result<QueryOutput, DatabaseError>;

    /// Release the session and its underlying resources
    async fn close(&self);

    /// Ask a running statement to stop as soon as possible
    ///
    /// Called when a caller gives up on a statement, so that it does not keep
    /// the session busy. Backends without cancellation support ignore it.
    fn interrupt(&self) {}

    /// Whether schema DDL has been executed successfully
    fn is_initialized(&self) -> bool;

    /// Catalog queries used to introspect this backend
    fn catalog(&self) -> &'static CatalogQueries;

    /// Schema the session's tables live in; introspected when none is
    /// configured
    fn default_schema(&self) -> &str;
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Error reported by the database engine
    #[error("Database error: {0}")]
    Query(String),

    /// The session was closed or replaced
    #[error("Database session is closed")]
    Closed,

    /// More than one statement was given where a single one is expected
    #[error("Only one statement can be run at a time, found {0}")]
    MultipleStatements(usize),

    /// Query timeout
    #[error("Query timeout exceeded")]
    Timeout,

    /// Result set too large
    #[error("Result set too large (max {0} rows)")]
    TooManyRows(u64),

    /// A result value could not be converted
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Reject text holding more than one statement
pub(crate) fn ensure_single_statement(sql: &str) -> Result<(), DatabaseError> {
    match count_statements(sql) {
        0 | 1 => Ok(()),
        found => Err(DatabaseError::MultipleStatements(found)),
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolClosed => DatabaseError::Closed,
            sqlx::Error::PoolTimedOut => DatabaseError::Timeout,
            other => DatabaseError::Query(other.to_string()),
        }
    }
}
