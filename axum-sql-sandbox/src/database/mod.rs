//! Database abstraction layer
//!
//! This module provides a backend-agnostic session interface for loading a
//! schema, running queries and answering catalog queries.

pub mod statements;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export the main trait
pub use traits::{CatalogQueries, DatabaseError, DatabaseSession};
