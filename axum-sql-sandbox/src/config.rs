//! Sandbox configuration
//!
//! Values can be given in code or read from `SQL_SANDBOX_*` environment
//! variables.

use serde::Deserialize;
use std::time::Duration;

/// Prefix of the environment variables read by [`SandboxConfig::from_env`]
pub const ENVIRONMENT_PREFIX: &str = "SQL_SANDBOX_";

fn default_query_timeout_seconds() -> u64 {
    30
}

fn default_max_result_rows() -> u64 {
    10_000
}

/// Settings shared by every operation of a sandbox
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SandboxConfig {
    /// Schema to introspect; the session's own schema when absent
    #[serde(default)]
    pub schema_name: Option<String>,

    /// Upper bound for a single query or introspection, in seconds
    #[serde(default = "default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,

    /// Largest result set a query may return
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            schema_name: None,
            query_timeout_seconds: default_query_timeout_seconds(),
            max_result_rows: default_max_result_rows(),
        }
    }
}

impl SandboxConfig {
    /// Read the configuration from `SQL_SANDBOX_*` environment variables
    ///
    /// e.g. `SQL_SANDBOX_QUERY_TIMEOUT_SECONDS=5`.
    pub fn from_env() -> crate::Result<Self> {
        Ok(envy::prefixed(ENVIRONMENT_PREFIX).from_env::<Self>()?)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }
}
