//! Process configuration, loaded from environment variables at startup.
//!
//! Every struct has a [`Default`] holding the built-in values and a
//! `from_env` constructor that overrides them from the environment.
//! Nothing is reloaded after startup.

use std::fmt;
use std::time::Duration;

/// Logging settings shared by the server and the worker.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub level: String,
    /// When `true`, emit log records as newline-delimited JSON.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            level: env_or("PRLENS_LOG", &d.level),
            json: env_flag("PRLENS_LOG_JSON", d.json),
        }
    }
}

/// GitHub REST API access.
#[derive(Clone)]
pub struct GitHubConfig {
    /// API root (default: `"https://api.github.com"`).
    pub api_url: String,
    /// Token used when a request does not carry its own.
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_owned(),
            token: None,
        }
    }
}

impl GitHubConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_url: env_or("PRLENS_GITHUB_API_URL", &d.api_url),
            token: env_opt("GITHUB_TOKEN"),
        }
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// OpenAI-compatible chat completion provider.
#[derive(Clone)]
pub struct LlmConfig {
    /// Bearer key; workers refuse to start without one.
    pub api_key: Option<String>,
    /// Provider root; `/v1/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Completion budget per request.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_owned(),
            model: "gpt-3.5-turbo".to_owned(),
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_key: env_opt("OPENAI_API_KEY"),
            base_url: env_or("PRLENS_LLM_BASE_URL", &d.base_url),
            model: env_or("PRLENS_LLM_MODEL", &d.model),
            temperature: parse_env("PRLENS_LLM_TEMPERATURE", d.temperature),
            max_tokens: parse_env("PRLENS_LLM_MAX_TOKENS", d.max_tokens),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// How pull request contents are split across LLM requests.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Estimated prompt tokens per chunk.
    pub chunk_max_tokens: usize,
    /// Pause between consecutive chunk requests.
    pub chunk_delay: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_max_tokens: 6000,
            chunk_delay: Duration::from_secs(20),
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            chunk_max_tokens: parse_env("PRLENS_CHUNK_MAX_TOKENS", d.chunk_max_tokens),
            chunk_delay: Duration::from_secs(parse_env(
                "PRLENS_CHUNK_DELAY_SECS",
                d.chunk_delay.as_secs(),
            )),
        }
    }
}

/// Everything a worker needs besides the store.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Tasks processed in parallel by one worker.
    pub concurrency: usize,
    /// Idle wait between queue polls.
    pub poll_interval: Duration,
    /// Hard limit for one task, fetch and analysis included.
    pub time_limit: Duration,
    /// How long finished tasks stay queryable.
    pub result_ttl: Duration,
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: Duration::from_millis(1000),
            time_limit: Duration::from_secs(300),
            result_ttl: Duration::from_secs(86_400),
            github: GitHubConfig::default(),
            llm: LlmConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            concurrency: parse_env("PRLENS_WORKER_CONCURRENCY", d.concurrency).max(1),
            poll_interval: Duration::from_millis(parse_env(
                "PRLENS_WORKER_POLL_MS",
                d.poll_interval.as_millis() as u64,
            )),
            time_limit: Duration::from_secs(parse_env(
                "PRLENS_TASK_TIME_LIMIT_SECS",
                d.time_limit.as_secs(),
            )),
            result_ttl: Duration::from_secs(parse_env(
                "PRLENS_RESULT_TTL_SECS",
                d.result_ttl.as_secs(),
            )),
            github: GitHubConfig::from_env(),
            llm: LlmConfig::from_env(),
            analysis: AnalysisConfig::from_env(),
        }
    }
}

/// Result backend location (default: `"sqlite://prlens.db"`).
pub fn database_url_from_env() -> String {
    env_or("PRLENS_DATABASE_URL", "sqlite://prlens.db")
}

// ── env helpers ──────────────────────────────────────────────────────────────

pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Unset and empty values both read as `None`.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

pub fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
