use crate::clients::ModelParams;
use crate::error::{Result, WeaverError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main configuration structure loaded from knowledge_weaver.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub server: ServerConfig,
}

/// Provider connection settings for the chat-completions backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai", "openrouter", or "custom"
    pub provider: String,
    /// Empty means "use the provider default"
    pub base_url: String,
    /// Empty means "use the provider default"
    pub model: String,
    /// Only ever read from LLM_API_KEY
    #[serde(skip)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: String::new(),
            model: String::new(),
            api_key: None,
            timeout_ms: 120_000,
        }
    }
}

/// Knobs for the outline-then-sections pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub outline_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_concurrent_sections: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_output_tokens: 4096,
            outline_attempts: 3,
            retry_delay_ms: 1000,
            max_concurrent_sections: 8,
        }
    }
}

impl GenerationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerEnvironment {
    Production,
    Development,
}

impl fmt::Display for ServerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEnvironment::Production => write!(f, "production"),
            ServerEnvironment::Development => write!(f, "development"),
        }
    }
}

impl ServerEnvironment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(ServerEnvironment::Production),
            "development" | "dev" => Some(ServerEnvironment::Development),
            _ => None,
        }
    }
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: ServerEnvironment,
    /// Defaults to http://localhost:<port> when unset
    pub frontend_origin: Option<String>,
    pub frontend_path: String,
    pub rate_limit: u32,
    pub rate_window_secs: u64,
    /// Wall-clock ceiling for one HTTP request, including every LLM call it makes
    pub request_timeout_secs: u64,
    /// "METHOD /path" pairs that bypass the rate limiter
    pub rate_limit_exempt: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            environment: ServerEnvironment::Production,
            frontend_origin: None,
            frontend_path: "index.html".to_string(),
            rate_limit: 5,
            rate_window_secs: 60,
            request_timeout_secs: 300,
            rate_limit_exempt: vec!["GET /health".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn frontend_origin(&self) -> String {
        self.frontend_origin
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment == ServerEnvironment::Production
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse::<T>().ok())
}

/// Values in the env file win over variables already set in the process.
/// Uses `path` when given, otherwise ./.env when present.
fn load_env_file(path: Option<&str>) {
    let loaded = match path {
        Some(path) => dotenvy::from_path_override(path).map(|_| ()),
        None => dotenvy::dotenv_override().map(|_| ()),
    };
    if let Err(e) = loaded {
        if !e.not_found() {
            tracing::warn!("Failed to load env file: {}", e);
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses KNOWLEDGE_WEAVER_CONFIG environment variable or defaults to "knowledge_weaver.toml"
    pub fn load() -> Result<Self> {
        load_env_file(std::env::var("WEAVER_ENV_FILE").ok().as_deref());

        let config_path = std::env::var("KNOWLEDGE_WEAVER_CONFIG")
            .unwrap_or_else(|_| "knowledge_weaver.toml".to_string());

        let mut config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            Self::from_toml_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.resolve_provider_defaults()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides (env-first) through an injectable lookup
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider.trim().to_ascii_lowercase();
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        self.llm.api_key = lookup("LLM_API_KEY").filter(|k| !k.is_empty());
        if let Some(timeout) = parse_env(&lookup, "LLM_TIMEOUT_MS") {
            self.llm.timeout_ms = timeout;
        }

        if let Some(t) = parse_env(&lookup, "WEAVER_TEMPERATURE") {
            self.generation.temperature = t;
        }
        if let Some(max) = parse_env(&lookup, "WEAVER_MAX_TOKENS") {
            self.generation.max_output_tokens = max;
        }
        if let Some(attempts) = parse_env(&lookup, "WEAVER_OUTLINE_ATTEMPTS") {
            self.generation.outline_attempts = attempts;
        }
        if let Some(delay) = parse_env(&lookup, "WEAVER_RETRY_DELAY_MS") {
            self.generation.retry_delay_ms = delay;
        }
        if let Some(cap) = parse_env(&lookup, "WEAVER_MAX_CONCURRENT_SECTIONS") {
            self.generation.max_concurrent_sections = cap;
        }

        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env(&lookup, "PORT") {
            self.server.port = port;
        }
        if let Some(env) = lookup("SERVER_ENV") {
            match ServerEnvironment::parse(&env) {
                Some(parsed) => self.server.environment = parsed,
                None => tracing::warn!("Unknown SERVER_ENV '{}', keeping {}", env, self.server.environment),
            }
        }
        if let Some(timeout) = parse_env(&lookup, "WEAVER_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = timeout;
        }
        if let Some(origin) = lookup("FRONTEND_ORIGIN") {
            self.server.frontend_origin = Some(origin);
        }
    }

    /// Fill base URL and model from the provider when not set explicitly
    pub fn resolve_provider_defaults(&mut self) -> Result<()> {
        let (default_url, default_model) = match self.llm.provider.as_str() {
            "openai" => ("https://api.openai.com/v1", "gpt-4o"),
            "openrouter" => ("https://openrouter.ai/api/v1", "anthropic/claude-3.5-sonnet"),
            "custom" => ("", ""),
            other => {
                return Err(WeaverError::Config {
                    message: format!(
                        "Unknown LLM provider '{}' (expected openai, openrouter, or custom)",
                        other
                    ),
                });
            }
        };
        if self.llm.base_url.is_empty() {
            self.llm.base_url = default_url.to_string();
        }
        if self.llm.model.is_empty() {
            self.llm.model = default_model.to_string();
        }
        Ok(())
    }

    /// Validate the configuration, clamping soft limits
    pub fn validate(&mut self) -> Result<()> {
        let invalid = |message: String| Err(WeaverError::Config { message });

        if self.llm.base_url.trim().is_empty() {
            return invalid("LLM base URL must be set (LLM_BASE_URL)".to_string());
        }
        if self.llm.model.trim().is_empty() {
            return invalid("LLM model must be set (LLM_MODEL)".to_string());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return invalid(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.generation.temperature
            ));
        }
        if self.generation.max_output_tokens == 0 {
            return invalid("max_output_tokens must be > 0".to_string());
        }
        if self.generation.max_concurrent_sections == 0 {
            return invalid("max_concurrent_sections must be >= 1".to_string());
        }
        if self.server.rate_limit == 0 || self.server.rate_window_secs == 0 {
            return invalid("rate_limit and rate_window_secs must be >= 1".to_string());
        }
        if self.server.request_timeout_secs == 0 {
            return invalid("request_timeout_secs must be >= 1".to_string());
        }

        if self.generation.outline_attempts == 0 {
            self.generation.outline_attempts = 1;
        } else if self.generation.outline_attempts > 10 {
            tracing::warn!(
                "outline_attempts {} exceeds max 10, clamping to 10",
                self.generation.outline_attempts
            );
            self.generation.outline_attempts = 10;
        }

        if self.llm.api_key.is_none() && self.llm.provider != "custom" {
            tracing::warn!("LLM_API_KEY is not set; provider calls will likely be rejected");
        }

        Ok(())
    }

    /// Convenience: snapshot the sampling parameters used for every call
    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            model: self.llm.model.clone(),
            temperature: self.generation.temperature,
            max_output_tokens: self.generation.max_output_tokens,
        }
    }
}
