//! Query editor completion endpoint

use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::database::traits::DatabaseSession;
use crate::sandbox::Sandbox;
use crate::Result;

/// Handler for POST /api/completions
///
/// Request body:
/// ```json
/// { "lineText": "SELECT * FROM us", "cursorColumn": 17 }
/// ```
///
/// Before a schema is loaded only SQL keywords are offered.
pub async fn complete_handler<DB: DatabaseSession>(
    State(sandbox): State<Arc<Sandbox<DB>>>,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>> {
    let provider = sandbox.completion_provider().await?;
    let candidates = provider.complete(&request.line_text, request.cursor_column);

    Ok(Json(CompletionResponse { candidates }))
}
