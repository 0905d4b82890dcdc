//! # axum-sql-sandbox
//!
//! An in-process SQL sandbox for learning SQL: load a schema, run queries
//! against it, and inspect the schema as a Mermaid ER diagram or as editor
//! completions. Easily integrable as an Axum layer.
//!
//! ## Features
//!
//! - Isolated database sessions (in-memory SQLite, or PostgreSQL)
//! - Schema introspection into tables, keys, relationships and indexes
//! - Mermaid `erDiagram` generation
//! - Schema-aware completion for query editors
//! - Query execution with positional result rows
//! - Clients for fetching exercise schemas and submitting solutions
//!
//! ## Security Warning
//!
//! Queries run with full access to the sandbox database. Sessions are meant
//! to hold throwaway learner schemas; never point a PostgreSQL session at a
//! database you care about.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use axum_sql_sandbox::{SandboxConfig, SqlSandboxLayer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let layer = SqlSandboxLayer::sqlite("/sandbox", SandboxConfig::default());
//!     layer
//!         .sandbox()
//!         .load_schema("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT);")
//!         .await
//!         .unwrap();
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "Hello, World!" }))
//!         .merge(layer.into_router());
//!
//!     // Serve the application...
//! }
//! ```

// Public modules
pub mod api;
pub mod completion;
pub mod config;
pub mod database;
pub mod diagram;
pub mod introspect;
pub mod layer;
pub mod remote;
pub mod sandbox;
pub mod schema;

// Public exports
pub use completion::{
    build_completion_context, CompletionCandidate, CompletionContext, CompletionKind,
    CompletionProvider, KeywordCompletionProvider, SchemaCompletionProvider,
};
pub use config::SandboxConfig;
pub use diagram::generate_diagram;
pub use introspect::{describe_schema, SchemaQueryPurpose};
pub use layer::SqlSandboxLayer;
pub use remote::{HttpSchemaSource, SubmissionClient};
pub use sandbox::{run_query, Sandbox};
pub use schema::{
    Attribute, AttributeKey, Entity, Field, IndexGroup, Nullability, QueryOutput, Relationship,
    RelationshipSide, SchemaDescription, SchemaDocument,
};

// Re-export database sessions
pub use database::traits::{DatabaseError, DatabaseSession};

#[cfg(feature = "sqlite")]
pub use database::sqlite::SqliteSession;

#[cfg(feature = "postgres")]
pub use database::postgres::PostgresSession;

// Error type
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A catalog query failed; schema information is unavailable
    #[error("Schema information unavailable: {purpose} query failed: {source}")]
    SchemaQuery {
        purpose: SchemaQueryPurpose,
        #[source]
        source: DatabaseError,
    },

    /// A query was attempted before a schema was loaded
    #[error("Database not initialized: load a schema first")]
    UninitializedSession,

    /// The user's query failed
    #[error("Query failed: {0}")]
    QueryExecution(#[source] DatabaseError),

    /// The schema DDL could not be loaded
    #[error("Schema could not be loaded: {0}")]
    SchemaLoad(#[source] DatabaseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] envy::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
