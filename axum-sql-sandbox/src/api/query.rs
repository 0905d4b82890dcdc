//! Query execution endpoint

use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::database::traits::DatabaseSession;
use crate::sandbox::Sandbox;
use crate::schema::{QueryOutput, QueryRequest};
use crate::Result;

/// Handler for POST /api/query
///
/// Executes a query against the active session.
///
/// # Security Warning
///
/// This endpoint executes ANY SQL statement, including DDL and writes, against
/// the sandbox database.
///
/// Request body:
/// ```json
/// { "sql": "SELECT id, id FROM users" }
/// ```
///
/// Response:
/// ```json
/// {
///   "fields": [{ "name": "id" }, { "name": "id" }],
///   "rows": [[1, 1], [2, 2]]
/// }
/// ```
///
/// Statements without result columns respond with empty `fields` and `rows`.
/// Rejected queries respond 400, or 409 if no schema has been loaded.
pub async fn execute_query_handler<DB: DatabaseSession>(
    State(sandbox): State<Arc<Sandbox<DB>>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryOutput>> {
    tracing::debug!(sql = %request.sql, "executing query");
    Ok(Json(sandbox.run_query(&request.sql).await?))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::super::create_api_router;
    use super::super::test_support::{loaded_sandbox, sandbox, send_json};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_query_returns_positional_rows() {
        let router = create_api_router(loaded_sandbox().await);

        let (status, _) = send_json(
            &router,
            Method::POST,
            "/query",
            Some(json!({ "sql": "INSERT INTO users (id, email) VALUES (1, 'a@example.com')" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(
            &router,
            Method::POST,
            "/query",
            Some(json!({ "sql": "SELECT id, email, id FROM users" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "fields": [{ "name": "id" }, { "name": "email" }, { "name": "id" }],
                "rows": [[1, "a@example.com", 1]]
            })
        );
    }

    #[tokio::test]
    async fn test_statement_without_columns() {
        let router = create_api_router(loaded_sandbox().await);

        let (status, body) = send_json(
            &router,
            Method::POST,
            "/query",
            Some(json!({ "sql": "DELETE FROM users" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "fields": [], "rows": [] }));
    }

    #[tokio::test]
    async fn test_query_errors() {
        let router = create_api_router(loaded_sandbox().await);
        let (status, body) = send_json(
            &router,
            Method::POST,
            "/query",
            Some(json!({ "sql": "SELEC 1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Query failed"));

        let uninitialized = create_api_router(sandbox());
        let (status, _) = send_json(
            &uninitialized,
            Method::POST,
            "/query",
            Some(json!({ "sql": "SELECT 1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_multiple_statements_are_a_bad_request() {
        let router = create_api_router(loaded_sandbox().await);
        let (status, body) = send_json(
            &router,
            Method::POST,
            "/query",
            Some(json!({ "sql": "SELECT 1 AS a; SELECT 2 AS b, 3 AS c" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("found 2"));
    }
}
