use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the qbank pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Completion backend used for question generation.
    pub llm_provider: ModelProvider,
    /// Model identifier passed to the provider.
    pub model_name: String,
    /// Filesystem path to quantized model weights (local provider only).
    pub model_path: Option<String>,
    /// Base URL of the Ollama runtime.
    pub ollama_url: Option<String>,
    /// API key for the hosted OpenAI-compatible endpoint.
    pub openai_api_key: Option<String>,
    /// Optional override for the hosted API base URL.
    pub openai_base_url: Option<String>,
    /// Maximum tokens requested per completion.
    pub max_tokens: u32,
    /// Sampling temperature passed to the provider.
    pub temperature: f32,
    /// Upper bound on chunk size in bytes of source text.
    pub max_chunk_size: usize,
    /// Overlap carried between adjacent chunks, in bytes.
    pub chunk_overlap: usize,
    /// Number of questions requested per chunk.
    pub questions_per_chunk: usize,
    /// Root directory for filesystem-backed job, document, and output storage.
    pub data_dir: String,
    /// Timeout imposed on each gateway invocation, in seconds.
    pub request_timeout_secs: u64,
    /// Cap on concurrent in-flight requests against remote providers.
    pub max_inflight_requests: usize,
    /// Structured log destination; a default under `logs/` is used when unset.
    pub log_file: Option<String>,
}

/// Supported completion backends for the generation pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Embedded quantized model loaded in-process.
    Local,
    /// Ollama runtime reached over HTTP.
    Ollama,
    /// Hosted OpenAI-compatible chat completion API.
    OpenAi,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            llm_provider: load_env_or("LLM_PROVIDER", "ollama")
                .parse()
                .map_err(|()| ConfigError::InvalidValue("LLM_PROVIDER".to_string()))?,
            model_name: load_env_or("MODEL_NAME", "llama3"),
            model_path: load_env_optional("MODEL_PATH"),
            ollama_url: load_env_optional("OLLAMA_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL"),
            max_tokens: parse_env_or("MAX_TOKENS", 2048)?,
            temperature: parse_env_or("TEMPERATURE", 0.7)?,
            max_chunk_size: parse_env_or("MAX_CHUNK_SIZE", 2000)?,
            chunk_overlap: parse_env_or("CHUNK_OVERLAP", 200)?,
            questions_per_chunk: parse_env_or("QUESTIONS_PER_CHUNK", 5)?,
            data_dir: load_env_or("DATA_DIR", "./data"),
            request_timeout_secs: parse_env_or("REQUEST_TIMEOUT_SECS", 120)?,
            max_inflight_requests: parse_env_or("MAX_INFLIGHT_REQUESTS", 4)?,
            log_file: load_env_optional("QBANK_LOG_FILE"),
        })
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        provider = ?config.llm_provider,
        model = %config.model_name,
        max_chunk_size = config.max_chunk_size,
        chunk_overlap = config.chunk_overlap,
        questions_per_chunk = config.questions_per_chunk,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
