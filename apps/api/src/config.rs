use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Default Anthropic Messages endpoint used when `LLM_BASE_URL` is not set.
pub const DEFAULT_LLM_URL: &str = "https://api.anthropic.com/v1/messages";
/// Default grading model.
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-5";

/// Application configuration loaded once from environment variables at startup.
///
/// Components never read the environment themselves; the relevant sub-config is
/// handed to each factory (`create_idp_adapter`, `Grader::from_config`, `JobQueue::start`).
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub idp: IdpConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    /// When set, webhook deliveries must carry a valid `hmac`.
    pub callback_hmac_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// Embedded fixture data, no network.
    Mock,
    /// Real extraction provider over HTTP; results arrive by webhook.
    Remote,
}

#[derive(Debug, Clone)]
pub struct IdpConfig {
    pub parser: ParserKind,
    pub start_url: Option<String>,
    pub extract_url: Option<String>,
    pub api_key: Option<String>,
    /// Substitute fixture data when the provider fails for a single document.
    pub fallback_to_fixtures: bool,
    pub timeout: Duration,
    /// Simulated latency of the fixture adapter.
    pub mock_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// No key means heuristic-only grading.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tag written on every Score row; re-grading under the same tag upserts.
    pub model_version: String,
    pub worker_pool_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_version: "v1".to_string(),
            worker_pool_size: 1,
        }
    }
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            parser: ParserKind::Mock,
            start_url: None,
            extract_url: None,
            api_key: None,
            fallback_to_fixtures: true,
            timeout: Duration::from_secs(30),
            mock_delay: Duration::from_millis(1000),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_LLM_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            port: parse_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            idp: IdpConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
            callback_hmac_secret: optional_env("CALLBACK_HMAC_SECRET"),
        })
    }
}

impl IdpConfig {
    fn from_env() -> Result<Self> {
        let parser = match std::env::var("PARSER")
            .unwrap_or_else(|_| "mock".to_string())
            .to_lowercase()
            .as_str()
        {
            "mock" => ParserKind::Mock,
            "remote" | "mule" => ParserKind::Remote,
            other => bail!("Unknown PARSER '{other}' (expected 'mock' or 'remote')"),
        };

        let start_url = optional_env("IDP_START_URL");
        let api_key = optional_env("IDP_API_KEY");
        if parser == ParserKind::Remote && (start_url.is_none() || api_key.is_none()) {
            bail!("IDP_START_URL and IDP_API_KEY must be set when PARSER=remote");
        }

        Ok(IdpConfig {
            parser,
            start_url,
            extract_url: optional_env("IDP_EXTRACT_URL"),
            api_key,
            fallback_to_fixtures: parse_env(
                "IDP_FALLBACK_TO_FIXTURES",
                parser == ParserKind::Mock,
            )
            .context("IDP_FALLBACK_TO_FIXTURES must be true or false")?,
            timeout: Duration::from_secs(
                parse_env("IDP_TIMEOUT_SECS", 30u64).context("IDP_TIMEOUT_SECS must be an integer")?,
            ),
            mock_delay: Duration::from_millis(
                parse_env("IDP_MOCK_DELAY_MS", 1000u64)
                    .context("IDP_MOCK_DELAY_MS must be an integer")?,
            ),
        })
    }
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        Ok(LlmConfig {
            api_key: optional_env("LLM_API_KEY"),
            base_url: optional_env("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            model: optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(
                parse_env("LLM_TIMEOUT_SECS", 30u64).context("LLM_TIMEOUT_SECS must be an integer")?,
            ),
            max_retries: parse_env("LLM_MAX_RETRIES", 2u32)
                .context("LLM_MAX_RETRIES must be an integer")?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self> {
        let worker_pool_size: usize =
            parse_env("WORKER_POOL_SIZE", 1).context("WORKER_POOL_SIZE must be an integer")?;
        if worker_pool_size == 0 {
            bail!("WORKER_POOL_SIZE must be at least 1");
        }
        Ok(PipelineConfig {
            model_version: optional_env("GRADER_MODEL_VERSION").unwrap_or_else(|| "v1".to_string()),
            worker_pool_size,
        })
    }
}

/// Returns the variable's value, treating unset and blank the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
