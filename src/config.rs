//! Configuration and settings management
//!
//! Loads settings from environment variables (and optional config files) and
//! defines the engine's tunable constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Chat id of the owner (broadcast and reply relay authority)
    pub owner_id: Option<i64>,

    /// Payment provider token used for invoices
    pub payment_provider_token: Option<String>,

    /// Gemini API key for the AI chat mode
    pub gemini_api_key: Option<String>,
    /// Gemini model identifier
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

/// Builds the layered configuration source shared by all settings loaders.
///
/// # Errors
///
/// Returns a `ConfigError` if one of the sources cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mazza_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or `TELEGRAM_TOKEN` is absent.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        // Fallback for values the automatic mapping did not pick up
        if settings.owner_id.is_none() {
            settings.owner_id = std::env::var("OWNER_ID")
                .ok()
                .and_then(|val| val.trim().parse().ok());
        }
        if settings.r2_endpoint_url.is_none() {
            settings.r2_endpoint_url = non_empty_env("R2_ENDPOINT_URL");
        }
        if settings.r2_bucket_name.is_none() {
            settings.r2_bucket_name = non_empty_env("R2_BUCKET_NAME");
        }

        if settings.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message("TELEGRAM_TOKEN is empty".into()));
        }

        Ok(settings)
    }

    /// Returns `true` if invoices can be issued
    #[must_use]
    pub fn payments_enabled(&self) -> bool {
        self.payment_provider_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }

    /// Returns `true` if every R2 credential is present
    #[must_use]
    pub fn r2_configured(&self) -> bool {
        self.r2_endpoint_url.is_some()
            && self.r2_access_key_id.is_some()
            && self.r2_secret_access_key.is_some()
            && self.r2_bucket_name.is_some()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|val| !val.is_empty())
}

/// Default Gemini model for the AI chat mode
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Temperature for text prompts
pub const GEMINI_CHAT_TEMPERATURE: f32 = 0.7;
/// Temperature for image prompts
pub const GEMINI_IMAGE_TEMPERATURE: f32 = 0.4;
/// Output token ceiling for Gemini answers
pub const GEMINI_MAX_OUTPUT_TOKENS: u32 = 4000;

/// Number of questions per quiz
pub const QUIZ_LENGTH: usize = 10;

/// Currency used for invoices
pub const INVOICE_CURRENCY: &str = "UZS";
/// Invoice payload echoed back by the payment provider
pub const INVOICE_PAYLOAD: &str = "fastfood_order";
/// Invoice title
pub const INVOICE_TITLE: &str = "Fast Food Buyurtmasi";

/// How long a processed event id is remembered (seconds).
/// Default: 10 minutes.
pub const DEDUP_TTL_SECS: u64 = 600;
/// Maximum number of remembered event ids.
pub const DEDUP_MAX_CAPACITY: u64 = 100_000;

/// Default HTTP timeout for the answering service (seconds)
pub const LLM_HTTP_TIMEOUT_SECS: u64 = 60;

/// Maximum retries for Telegram file downloads
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff for Telegram retries (milliseconds)
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for Telegram retries (milliseconds)
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Get dedup horizon from env or default.
///
/// Environment variable: `DEDUP_TTL_SECS`.
#[must_use]
pub fn get_dedup_ttl_secs() -> u64 {
    std::env::var("DEDUP_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEDUP_TTL_SECS)
}

/// Get dedup capacity from env or default.
///
/// Environment variable: `DEDUP_MAX_CAPACITY`.
#[must_use]
pub fn get_dedup_max_capacity() -> u64 {
    std::env::var("DEDUP_MAX_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEDUP_MAX_CAPACITY)
}

/// Get answering service HTTP timeout from env or default.
///
/// Environment variable: `LLM_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_llm_http_timeout_secs() -> u64 {
    std::env::var("LLM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LLM_HTTP_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            owner_id: None,
            payment_provider_token: None,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_endpoint_url: None,
            r2_bucket_name: None,
        }
    }

    // Single test touches the process environment to avoid races
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("OWNER_ID", "4242");
        env::set_var("PAYMENT_PROVIDER_TOKEN", "");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.owner_id, Some(4242));
        assert!(!settings.payments_enabled());
        assert_eq!(settings.gemini_model, DEFAULT_GEMINI_MODEL);

        env::remove_var("OWNER_ID");
        env::remove_var("PAYMENT_PROVIDER_TOKEN");
        env::remove_var("TELEGRAM_TOKEN");
        Ok(())
    }

    #[test]
    fn test_payments_and_r2_flags() {
        let mut settings = settings();
        assert!(!settings.payments_enabled());
        assert!(!settings.r2_configured());

        settings.payment_provider_token = Some("  ".to_string());
        assert!(!settings.payments_enabled());
        settings.payment_provider_token = Some("398062629:TEST:abc".to_string());
        assert!(settings.payments_enabled());

        settings.r2_endpoint_url = Some("https://r2.example".to_string());
        settings.r2_access_key_id = Some("id".to_string());
        settings.r2_secret_access_key = Some("secret".to_string());
        assert!(!settings.r2_configured());
        settings.r2_bucket_name = Some("users".to_string());
        assert!(settings.r2_configured());
    }
}
