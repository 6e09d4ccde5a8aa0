use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which intent classifier the deployment uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentStrategy {
    /// Ask the text model for a JSON verdict.
    Model,
    /// Multilingual keyword matching, no network call.
    Keyword,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: Option<String>,
    pub api_base: String,
    pub chat_model: String,
    pub image_model: String,
    pub image_size: String,
    pub study_code: Option<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub intent_strategy: IntentStrategy,
    pub intent_keywords_path: Option<PathBuf>,
    pub reply_temperature: f32,
    pub reply_max_tokens: u32,
    pub upstream_timeout: Duration,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            openai_api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            image_model: "gpt-image-1".to_string(),
            image_size: "1024x1024".to_string(),
            study_code: None,
            rate_limit_window: Duration::from_millis(600_000),
            rate_limit_max: 40,
            intent_strategy: IntentStrategy::Model,
            intent_keywords_path: None,
            reply_temperature: 0.7,
            reply_max_tokens: 120,
            upstream_timeout: Duration::from_secs(60),
            log_level: Level::INFO,
            prompts_path: PathBuf::from("./prompts"),
        }
    }
}

/// Reads a variable, treating blank values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// A missing `OPENAI_API_KEY` is not an error here: the service still
    /// starts and answers chat requests with a server error until it is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        let bind_address = match non_empty_var("BIND_ADDRESS") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?,
            None => SocketAddr::from(([0, 0, 0, 0], parse_var("PORT", 3000u16)?)),
        };

        let rate_limit_window_ms = parse_var("RATE_LIMIT_WINDOW_MS", 600_000u64)?;
        if rate_limit_window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_WINDOW_MS".to_string(),
                "window must be greater than zero".to_string(),
            ));
        }
        let rate_limit_max = parse_var("RATE_LIMIT_MAX", defaults.rate_limit_max)?;
        if rate_limit_max == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_MAX".to_string(),
                "max must be greater than zero".to_string(),
            ));
        }

        let intent_strategy = match non_empty_var("INTENT_STRATEGY")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            None | Some("model") => IntentStrategy::Model,
            Some("keyword") => IntentStrategy::Keyword,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "INTENT_STRATEGY".to_string(),
                    format!("'{}' is not one of 'model' or 'keyword'", other),
                ));
            }
        };

        let log_level_str = non_empty_var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            api_base: non_empty_var("OPENAI_API_BASE").unwrap_or(defaults.api_base),
            chat_model: non_empty_var("OPENAI_MODEL").unwrap_or(defaults.chat_model),
            image_model: non_empty_var("IMAGE_MODEL").unwrap_or(defaults.image_model),
            image_size: non_empty_var("IMAGE_SIZE").unwrap_or(defaults.image_size),
            study_code: non_empty_var("STUDY_CODE"),
            rate_limit_window: Duration::from_millis(rate_limit_window_ms),
            rate_limit_max,
            intent_strategy,
            intent_keywords_path: non_empty_var("INTENT_KEYWORDS_PATH").map(PathBuf::from),
            reply_temperature: parse_var("REPLY_TEMPERATURE", defaults.reply_temperature)?,
            reply_max_tokens: parse_var("REPLY_MAX_TOKENS", defaults.reply_max_tokens)?,
            upstream_timeout: Duration::from_secs(parse_var("UPSTREAM_TIMEOUT_SECS", 60u64)?),
            log_level,
            prompts_path: non_empty_var("PROMPTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.prompts_path),
        })
    }

    /// The upstream credential, required to serve chat requests.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
    }
}
