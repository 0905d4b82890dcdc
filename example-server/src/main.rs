use axum::{extract::State, http::StatusCode, routing::get, Router};
use axum_sql_sandbox::{Sandbox, SandboxConfig, SqlSandboxLayer, SqliteSession};
use serde::Deserialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod database;

fn default_bind_to() -> String {
    "127.0.0.1:3000".to_string()
}

/// Server settings, read from `SQL_SANDBOX_*` environment variables
#[derive(Debug, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_bind_to")]
    bind_to: String,

    /// DDL file to load instead of the demo shop schema
    #[serde(default)]
    schema_file: Option<String>,
}

#[derive(Clone)]
struct ApplicationState {
    sandbox: Arc<Sandbox<SqliteSession>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let server_config: ServerConfig =
        envy::prefixed(axum_sql_sandbox::config::ENVIRONMENT_PREFIX).from_env()?;
    let sandbox_config = SandboxConfig::from_env()?;

    let layer = SqlSandboxLayer::sqlite("/sandbox", sandbox_config);
    let sandbox = layer.sandbox();

    match &server_config.schema_file {
        Some(path) => {
            let ddl = tokio::fs::read_to_string(path).await?;
            sandbox.load_schema(&ddl).await?;
            tracing::info!(%path, "schema file loaded");
        }
        None => {
            sandbox.load_schema(database::DEMO_SCHEMA).await?;
            database::seed(&sandbox).await?;
        }
    }

    let application_state = ApplicationState { sandbox };

    // SqlSandboxLayer returns a stateless Router, so it is merged after with_state()
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .with_state(application_state)
        .merge(layer.into_router());

    let listener = tokio::net::TcpListener::bind(&server_config.bind_to).await?;

    tracing::info!("Server running at http://{}", server_config.bind_to);
    tracing::info!("Health check at http://{}/api/health", server_config.bind_to);
    tracing::info!("Sandbox API available at http://{}/sandbox/api", server_config.bind_to);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "Welcome to axum-sql-sandbox example server"
}

async fn health_handler(
    State(state): State<ApplicationState>,
) -> Result<(StatusCode, &'static str), StatusCode> {
    state
        .sandbox
        .run_query("SELECT 1")
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok((StatusCode::OK, "Server is healthy"))
}
