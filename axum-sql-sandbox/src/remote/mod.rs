//! Clients for the exercise server
//!
//! Exercise schemas are fetched by id from a [`SchemaSource`]; solutions are
//! posted back through a [`SubmissionClient`].

use async_trait::async_trait;

use crate::schema::SchemaDocument;

pub mod schema_source;
pub mod submission;

pub use schema_source::HttpSchemaSource;
pub use submission::{Submission, SubmissionClient};

/// Where schema DDL comes from, keyed by schema id
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_schema(&self, schema_id: &str) -> crate::Result<SchemaDocument>;
}
