//! REST API endpoints
//!
//! Handlers share one [`Sandbox`] as router state. Every failure is reported
//! as `{ "error": message }` with a status derived from the [`Error`] kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::database::traits::{DatabaseError, DatabaseSession};
use crate::sandbox::Sandbox;
use crate::Error;

pub mod completion;
pub mod query;
pub mod schema;

// Re-export handlers for convenience
pub use completion::complete_handler;
pub use query::execute_query_handler;
pub use schema::{
    completion_context_handler, describe_schema_handler, diagram_handler, load_schema_handler,
};

/// Create the API router with all endpoints and the sandbox attached as state
pub fn create_api_router<DB: DatabaseSession>(sandbox: Arc<Sandbox<DB>>) -> Router {
    Router::new()
        .route(
            "/schema",
            post(load_schema_handler::<DB>).get(describe_schema_handler::<DB>),
        )
        .route("/schema/diagram", get(diagram_handler::<DB>))
        .route(
            "/schema/completion-context",
            get(completion_context_handler::<DB>),
        )
        .route("/completions", post(complete_handler::<DB>))
        .route("/query", post(execute_query_handler::<DB>))
        .with_state(sandbox)
}

impl Error {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UninitializedSession => StatusCode::CONFLICT,
            Error::SchemaQuery { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::QueryExecution(DatabaseError::Timeout) => StatusCode::REQUEST_TIMEOUT,
            Error::QueryExecution(_) => StatusCode::BAD_REQUEST,
            Error::SchemaLoad(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Serialization(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::SchemaQueryPurpose;

    #[test]
    fn test_status_codes() {
        let cases = [
            (Error::UninitializedSession, StatusCode::CONFLICT),
            (
                Error::SchemaQuery {
                    purpose: SchemaQueryPurpose::Indexes,
                    source: DatabaseError::Closed,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                Error::QueryExecution(DatabaseError::Timeout),
                StatusCode::REQUEST_TIMEOUT,
            ),
            (
                Error::QueryExecution(DatabaseError::Query("syntax error".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::SchemaLoad(DatabaseError::Query("syntax error".to_string())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error}");
        }
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = Error::UninitializedSession.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({ "error": "Database not initialized: load a schema first" })
        );
    }
}
