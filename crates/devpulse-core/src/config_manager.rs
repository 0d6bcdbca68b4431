use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for crate::PulseError {
    fn from(err: ConfigError) -> Self {
        crate::PulseError::Config(err.to_string())
    }
}

/// Main configuration for DevPulse
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PulseConfig {
    /// Completion service used for analysis
    #[serde(default)]
    pub llm: LLMConfig,

    /// Deadlines, pacing and data windows for insight generation
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Insight and activity store
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM configuration for insight generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// LLM provider: "openai", "openai-compatible", "anthropic"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model identifier; provider default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL override (required for "openai-compatible")
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            base_url: None,
            openai_api_key: None,
            anthropic_api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Pipeline bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for one model call; the request is aborted when it elapses
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Dispatcher deadline for a single rubric
    #[serde(default = "default_single_timeout_secs")]
    pub single_timeout_secs: u64,

    /// Dispatcher deadline for "generate all"
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,

    /// Pause between consecutive rubrics in a batch
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_insight_ttl_days")]
    pub insight_ttl_days: i64,

    /// Commit window
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    #[serde(default = "default_commit_limit")]
    pub commit_limit: usize,

    #[serde(default = "default_pull_request_limit")]
    pub pull_request_limit: usize,

    /// Items of each slice embedded in a prompt
    #[serde(default = "default_prompt_sample_size")]
    pub prompt_sample_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_timeout_secs: default_model_timeout_secs(),
            single_timeout_secs: default_single_timeout_secs(),
            batch_timeout_secs: default_batch_timeout_secs(),
            batch_delay_ms: default_batch_delay_ms(),
            insight_ttl_days: default_insight_ttl_days(),
            lookback_days: default_lookback_days(),
            commit_limit: default_commit_limit(),
            pull_request_limit: default_pull_request_limit(),
            prompt_sample_size: default_prompt_sample_size(),
        }
    }
}

impl PipelineConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn single_timeout(&self) -> Duration {
        Duration::from_secs(self.single_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn insight_ttl(&self) -> ChronoDuration {
        ChronoDuration::days(self.insight_ttl_days)
    }

    pub fn lookback(&self) -> ChronoDuration {
        ChronoDuration::days(self.lookback_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> usize {
    2000
}
fn default_model_timeout_secs() -> u64 {
    25
}
fn default_single_timeout_secs() -> u64 {
    30
}
fn default_batch_timeout_secs() -> u64 {
    60
}
fn default_batch_delay_ms() -> u64 {
    1000
}
fn default_insight_ttl_days() -> i64 {
    7
}
fn default_lookback_days() -> i64 {
    30
}
fn default_commit_limit() -> usize {
    100
}
fn default_pull_request_limit() -> usize {
    50
}
fn default_prompt_sample_size() -> usize {
    15
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8787
}
fn default_database_url() -> String {
    "sqlite://devpulse.db".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: PulseConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.devpulse.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        info!("Loading DevPulse configuration");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!(config_file = %path.display(), "Configuration loaded"),
            None => info!("Configuration loaded (no config file, using defaults)"),
        }
        info!(
            provider = %config.llm.provider,
            model = ?config.llm.model,
            model_timeout_secs = config.pipeline.model_timeout_secs,
            "LLM settings"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Wrap an already-built configuration after validating it.
    pub fn from_config(config: PulseConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("Loaded .env file from current directory");
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".devpulse.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .devpulse.env: {}", e);
                } else {
                    info!("Loaded .devpulse.env from home directory");
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.devpulse.toml
    /// 2. ~/.devpulse/config.toml
    /// 3. Defaults
    fn load_config_file() -> Result<(PulseConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".devpulse.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".devpulse").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((PulseConfig::default(), None))
    }

    pub fn read_toml_file(path: &Path) -> Result<PulseConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_overrides<F>(mut config: PulseConfig, lookup: F) -> PulseConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("DEVPULSE_LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(model) = lookup("DEVPULSE_LLM_MODEL") {
            config.llm.model = Some(model);
        }
        if let Some(url) = lookup("DEVPULSE_LLM_BASE_URL") {
            config.llm.base_url = Some(url);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            config.llm.anthropic_api_key = Some(key);
        }
        if let Some(temp) = lookup("DEVPULSE_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.llm.temperature = t;
            }
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database.url = url;
        }

        if let Some(host) = lookup("DEVPULSE_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("DEVPULSE_PORT") {
            match port.parse() {
                Ok(p) => config.server.port = p,
                Err(_) => warn!("Ignoring invalid DEVPULSE_PORT: {}", port),
            }
        }

        if let Some(level) = lookup("DEVPULSE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("DEVPULSE_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    pub fn validate_config(config: &PulseConfig) -> Result<(), ConfigError> {
        match config.llm.provider.as_str() {
            "openai" | "openai-compatible" | "anthropic" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid LLM provider: {}. Must be one of: openai, openai-compatible, anthropic",
                    other
                )))
            }
        }

        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Temperature must be within [0, 2], got {}",
                config.llm.temperature
            )));
        }

        let pipeline = &config.pipeline;
        if pipeline.model_timeout_secs == 0
            || pipeline.single_timeout_secs == 0
            || pipeline.batch_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        if pipeline.single_timeout_secs <= pipeline.model_timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "single_timeout_secs ({}) must exceed model_timeout_secs ({})",
                pipeline.single_timeout_secs, pipeline.model_timeout_secs
            )));
        }
        if pipeline.insight_ttl_days <= 0 {
            return Err(ConfigError::ValidationError(
                "insight_ttl_days must be positive".to_string(),
            ));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self {
            config: PulseConfig::default(),
            config_path: None,
        }
    }
}
