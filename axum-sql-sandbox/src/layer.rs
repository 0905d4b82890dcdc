//! SqlSandboxLayer - Main Axum integration layer
//!
//! This module provides the main entry point for mounting a sandbox into an
//! Axum application.

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::create_api_router;
use crate::config::SandboxConfig;
use crate::database::traits::DatabaseSession;
use crate::sandbox::Sandbox;

#[cfg(feature = "sqlite")]
use crate::database::sqlite::{SqliteSession, SqliteSessionOptions};

#[cfg(feature = "postgres")]
use crate::database::postgres::{PostgresSession, PostgresSessionOptions};

/// Main layer for integrating a SQL sandbox into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use axum_sql_sandbox::{SandboxConfig, SqlSandboxLayer};
///
/// # async fn example() {
/// let layer = SqlSandboxLayer::sqlite("/sandbox", SandboxConfig::default());
/// let sandbox = layer.sandbox();
/// let app = Router::new().merge(layer.into_router());
///
/// sandbox
///     .load_schema("CREATE TABLE a (id INTEGER PRIMARY KEY);")
///     .await
///     .unwrap();
/// # }
/// ```
pub struct SqlSandboxLayer<DB: DatabaseSession> {
    base_path: String,
    sandbox: Arc<Sandbox<DB>>,
}

impl<DB: DatabaseSession> SqlSandboxLayer<DB> {
    /// Mount `sandbox` at `base_path` (e.g. "/sandbox")
    pub fn new(base_path: impl Into<String>, sandbox: Sandbox<DB>) -> Self {
        Self {
            base_path: base_path.into(),
            sandbox: Arc::new(sandbox),
        }
    }

    /// Shared handle to the sandbox, for loading schemas outside HTTP
    pub fn sandbox(&self) -> Arc<Sandbox<DB>> {
        self.sandbox.clone()
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router serves the API at `{base_path}/api/*` behind
    /// permissive CORS and request tracing.
    pub fn into_router(self) -> Router {
        let base_path = self.base_path.trim_end_matches('/');

        Router::new()
            .nest(&format!("{base_path}/api"), create_api_router(self.sandbox))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
    }
}

#[cfg(feature = "sqlite")]
impl SqlSandboxLayer<SqliteSession> {
    /// Sandbox backed by in-memory SQLite sessions
    pub fn sqlite(base_path: impl Into<String>, config: SandboxConfig) -> Self {
        Self::new(
            base_path,
            Sandbox::new(SqliteSessionOptions::default(), config),
        )
    }
}

#[cfg(feature = "postgres")]
impl SqlSandboxLayer<PostgresSession> {
    /// Sandbox backed by a PostgreSQL database
    ///
    /// Loading a schema runs its DDL against that database.
    pub fn postgres(
        base_path: impl Into<String>,
        options: PostgresSessionOptions,
        config: SandboxConfig,
    ) -> Self {
        Self::new(base_path, Sandbox::new(options, config))
    }
}
