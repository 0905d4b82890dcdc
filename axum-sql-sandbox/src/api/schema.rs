//! Schema endpoints: load, describe, diagram and completion context

use axum::{extract::State, http::StatusCode, response::Json};
use std::sync::Arc;

use crate::completion::CompletionContext;
use crate::database::traits::DatabaseSession;
use crate::sandbox::Sandbox;
use crate::schema::{SchemaDescription, SchemaDocument};
use crate::Result;

/// Handler for POST /api/schema
///
/// Replaces the active session with one holding the posted DDL.
///
/// Request body:
/// ```json
/// { "schema": "CREATE TABLE users (id INTEGER PRIMARY KEY);" }
/// ```
///
/// Responds 204 on success and 422 when the DDL is rejected.
pub async fn load_schema_handler<DB: DatabaseSession>(
    State(sandbox): State<Arc<Sandbox<DB>>>,
    Json(document): Json<SchemaDocument>,
) -> Result<StatusCode> {
    sandbox.load_schema(&document.schema).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/schema
pub async fn describe_schema_handler<DB: DatabaseSession>(
    State(sandbox): State<Arc<Sandbox<DB>>>,
) -> Result<Json<SchemaDescription>> {
    Ok(Json(sandbox.describe().await?))
}

/// Handler for GET /api/schema/diagram
///
/// Returns the Mermaid `erDiagram` document as `text/plain`.
pub async fn diagram_handler<DB: DatabaseSession>(
    State(sandbox): State<Arc<Sandbox<DB>>>,
) -> Result<String> {
    sandbox.diagram().await
}

/// Handler for GET /api/schema/completion-context
pub async fn completion_context_handler<DB: DatabaseSession>(
    State(sandbox): State<Arc<Sandbox<DB>>>,
) -> Result<Json<CompletionContext>> {
    Ok(Json(sandbox.completion_context().await?))
}
