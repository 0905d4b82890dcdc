//! Query execution and session ownership
//!
//! [`run_query`] is the query façade over any session. [`Sandbox`] owns the
//! single active session of a page: loading a schema always releases the
//! previous session before a new one is created, and a session is never
//! reused once it has been replaced.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};

use crate::completion::{
    build_completion_context, CompletionContext, CompletionProvider, KeywordCompletionProvider,
    SchemaCompletionProvider,
};
use crate::config::SandboxConfig;
use crate::database::traits::{DatabaseError, DatabaseSession};
use crate::diagram::generate_diagram;
use crate::introspect::describe_schema;
use crate::remote::SchemaSource;
use crate::schema::{QueryOutput, SchemaDescription};
use crate::{Error, Result};

/// Result size limit applied by [`run_query`]
pub const DEFAULT_MAX_RESULT_ROWS: u64 = 10_000;

/// Run a query against a session and return positional rows
///
/// Fails with [`Error::UninitializedSession`] if no schema was loaded into
/// the session, and with [`Error::QueryExecution`] for everything the
/// database rejects. A statement without result columns succeeds with empty
/// `fields`.
pub async fn run_query<DB>(session: &DB, query_text: &str) -> Result<QueryOutput>
where
    DB: DatabaseSession + ?Sized,
{
    run_query_with_limit(session, query_text, DEFAULT_MAX_RESULT_ROWS).await
}

/// [`run_query`] with an explicit result size limit
pub async fn run_query_with_limit<DB>(
    session: &DB,
    query_text: &str,
    max_result_rows: u64,
) -> Result<QueryOutput>
where
    DB: DatabaseSession + ?Sized,
{
    if !session.is_initialized() {
        return Err(Error::UninitializedSession);
    }

    let output = session.query(query_text, &[]).await.map_err(|error| {
        tracing::debug!(%error, "query rejected");
        Error::QueryExecution(error)
    })?;

    if output.rows.len() as u64 > max_result_rows {
        return Err(Error::QueryExecution(DatabaseError::TooManyRows(
            max_result_rows,
        )));
    }

    Ok(output)
}

/// Owner of the active database session
///
/// # Example
///
/// ```rust,no_run
/// use axum_sql_sandbox::database::sqlite::SqliteSessionOptions;
/// use axum_sql_sandbox::{Sandbox, SandboxConfig, SqliteSession};
///
/// # async fn example() -> axum_sql_sandbox::Result<()> {
/// let sandbox: Sandbox<SqliteSession> =
///     Sandbox::new(SqliteSessionOptions::default(), SandboxConfig::default());
/// sandbox.load_schema("CREATE TABLE a (id INTEGER PRIMARY KEY);").await?;
///
/// let output = sandbox.run_query("SELECT * FROM a").await?;
/// assert_eq!(output.fields.len(), 1);
/// println!("{}", sandbox.diagram().await?);
/// # Ok(())
/// # }
/// ```
pub struct Sandbox<DB: DatabaseSession> {
    options: DB::Options,
    config: SandboxConfig,
    session: RwLock<Option<Arc<DB>>>,
    reload_lock: Mutex<()>,
    readiness: watch::Sender<bool>,
}

impl<DB: DatabaseSession> Sandbox<DB> {
    /// Create a sandbox without a session; call [`load_schema`] to start one
    ///
    /// [`load_schema`]: Sandbox::load_schema
    pub fn new(options: DB::Options, config: SandboxConfig) -> Self {
        let (readiness, _) = watch::channel(false);

        Self {
            options,
            config,
            session: RwLock::new(None),
            reload_lock: Mutex::new(()),
            readiness,
        }
    }

    /// Limits and defaults this sandbox was created with
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Replace the active session with a fresh one holding `ddl`
    ///
    /// The previous session is closed first. If the DDL is rejected no
    /// session remains active.
    #[tracing::instrument(skip_all)]
    pub async fn load_schema(&self, ddl: &str) -> Result<()> {
        let _reload = self.reload_lock.lock().await;

        let previous = self.session.write().await.take();
        if let Some(previous) = previous {
            self.release(previous).await;
            tracing::debug!("released previous session");
        }

        let session = DB::create(&self.options).await.map_err(Error::SchemaLoad)?;
        if let Err(error) = session.exec(ddl).await {
            tracing::warn!(%error, "schema DDL rejected");
            session.close().await;
            return Err(Error::SchemaLoad(error));
        }

        *self.session.write().await = Some(Arc::new(session));
        self.readiness.send_replace(true);
        tracing::info!("schema loaded");

        Ok(())
    }

    /// Fetch a schema document from `source` and load it
    pub async fn reload_from_source(&self, source: &dyn SchemaSource, schema_id: &str) -> Result<()> {
        let document = source.fetch_schema(schema_id).await?;
        self.load_schema(&document.schema).await
    }

    /// Resolve once a schema has been loaded successfully
    pub async fn wait_ready(&self) {
        let mut receiver = self.readiness.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close
        let _ = receiver.wait_for(|ready| *ready).await;
    }

    /// The active session, if a schema has been loaded
    pub async fn session(&self) -> Result<Arc<DB>> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(Error::UninitializedSession)
    }

    /// Close the active session, if any
    pub async fn close(&self) {
        let _reload = self.reload_lock.lock().await;
        let previous = self.session.write().await.take();
        if let Some(previous) = previous {
            self.release(previous).await;
        }
    }

    /// Run a user query against the active session
    #[tracing::instrument(skip_all)]
    pub async fn run_query(&self, query_text: &str) -> Result<QueryOutput> {
        let session = self.session().await?;
        let operation =
            run_query_with_limit(session.as_ref(), query_text, self.config.max_result_rows);
        self.with_timeout(session.as_ref(), operation).await
    }

    /// Introspect the active session's schema
    pub async fn describe(&self) -> Result<SchemaDescription> {
        let session = self.session().await?;
        let schema_name = self
            .config
            .schema_name
            .as_deref()
            .unwrap_or_else(|| session.default_schema());

        self.with_timeout(
            session.as_ref(),
            describe_schema(session.as_ref(), schema_name),
        )
        .await
    }

    /// Mermaid ER diagram of the active schema
    pub async fn diagram(&self) -> Result<String> {
        Ok(generate_diagram(&self.describe().await?))
    }

    /// Table and column names of the active schema
    pub async fn completion_context(&self) -> Result<CompletionContext> {
        Ok(build_completion_context(&self.describe().await?))
    }

    /// A completion provider matching the current state
    ///
    /// Keyword completion only until a schema has been loaded.
    pub async fn completion_provider(&self) -> Result<Box<dyn CompletionProvider>> {
        match self.session().await {
            Ok(_) => Ok(Box::new(SchemaCompletionProvider::new(
                self.completion_context().await?,
            ))),
            Err(Error::UninitializedSession) => Ok(Box::new(KeywordCompletionProvider)),
            Err(error) => Err(error),
        }
    }

    /// Bound `operation` by the query timeout, interrupting `session` on expiry
    async fn with_timeout<T>(
        &self,
        session: &DB,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.config.query_timeout(), operation)
            .await
            .unwrap_or_else(|_elapsed| {
                tracing::warn!(
                    timeout_seconds = self.config.query_timeout_seconds,
                    "operation timed out"
                );
                session.interrupt();
                Err(Error::QueryExecution(DatabaseError::Timeout))
            })
    }

    /// Close a session that is no longer active without waiting on it forever
    async fn release(&self, session: Arc<DB>) {
        session.interrupt();
        if tokio::time::timeout(self.config.query_timeout(), session.close())
            .await
            .is_err()
        {
            tracing::warn!("previous session did not close in time, abandoning it");
        }
    }
}
