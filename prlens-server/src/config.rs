//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

use prlens_core::config::{database_url_from_env, env_flag, env_opt, env_or, LogConfig};

/// Runtime configuration for prlens-server.
///
/// Every field has a default so the server starts without any environment
/// variables set. Worker settings are read separately, and only when the
/// embedded worker is enabled.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// SQLite database URL shared with the workers (default: `"sqlite://prlens.db"`).
    pub database_url: String,

    /// Comma-separated list of allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Directory holding `index.html` and the other static assets.
    pub static_dir: PathBuf,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Run a worker inside the server process.
    pub embedded_worker: bool,

    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_owned(),
            database_url: "sqlite://prlens.db".to_owned(),
            cors_allowed_origins: None,
            static_dir: PathBuf::from("static"),
            enable_docs: true,
            embedded_worker: false,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_address: env_or("PRLENS_BIND", &d.bind_address),
            database_url: database_url_from_env(),
            cors_allowed_origins: env_opt("PRLENS_CORS_ORIGINS"),
            static_dir: env_opt("PRLENS_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.static_dir),
            enable_docs: env_flag("PRLENS_ENABLE_DOCS", d.enable_docs),
            embedded_worker: env_flag("PRLENS_EMBEDDED_WORKER", d.embedded_worker),
            log: LogConfig::from_env(),
        }
    }
}
