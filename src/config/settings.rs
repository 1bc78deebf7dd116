//! Configuration settings management
//!
//! This module handles loading configuration from multiple sources,
//! validation, and persistence.

use crate::error::{PhraseError, Result};
use crate::utils::retry::RetryOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "dailyphrase";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Backoff settings for the generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.15,
        }
    }
}

impl RetrySettings {
    /// Copy these timings onto `options`, keeping its predicate and observer.
    pub fn apply<E>(&self, options: RetryOptions<E>) -> RetryOptions<E> {
        options
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_jitter_factor(self.jitter_factor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debug: bool,
    pub log_json: bool,
    /// JSON file holding the phrase pool
    pub store_path: PathBuf,
    /// Seconds between scheduled generation runs
    pub schedule_interval_secs: u64,
    /// Overrides the built-in generation prompt
    pub prompt: Option<String>,
    // tables last so the TOML output stays valid
    pub gemini: GeminiConfig,
    pub retry: RetrySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            log_json: false,
            store_path: default_store_path(),
            schedule_interval_secs: 24 * 60 * 60, // daily
            prompt: None,
            gemini: GeminiConfig::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.gemini.model.trim().is_empty() {
            return Err(PhraseError::config("Gemini model name is required"));
        }

        if self.gemini.endpoint.trim().is_empty() {
            return Err(PhraseError::config("Gemini endpoint is required"));
        }

        if self.gemini.request_timeout_secs == 0 {
            return Err(PhraseError::config(
                "gemini.request_timeout_secs must be greater than zero",
            ));
        }

        if self.schedule_interval_secs == 0 {
            return Err(PhraseError::config(
                "schedule_interval_secs must be greater than zero",
            ));
        }

        if self.store_path.as_os_str().is_empty() {
            return Err(PhraseError::config("store_path is required"));
        }

        self.retry.apply(RetryOptions::new(|_: &PhraseError| true)).validate()
    }

    /// Generation needs credentials, serving does not.
    pub fn require_api_key(&self) -> Result<()> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(PhraseError::config(
                "Gemini API key is required. Set GEMINI_API_KEY or gemini.api_key in the config file",
            ));
        }
        Ok(())
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        // Use XDG Base Directory specification on Linux and macOS
        // On Windows, use the platform-appropriate config directory
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            use std::env;
            let config_dir = if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
                PathBuf::from(xdg_config_home)
            } else {
                let home_dir = env::var("HOME")
                    .map_err(|_| PhraseError::config("HOME environment variable not set"))?;
                PathBuf::from(home_dir).join(".config")
            };
            Ok(config_dir.join(APP_DIR).join("config.toml"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let config_dir = dirs::config_dir()
                .ok_or_else(|| PhraseError::config("Unable to determine config directory"))?;
            Ok(config_dir.join(APP_DIR).join("config.toml"))
        }
    }
}

/// Human-readable dump with the API key masked
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.gemini.api_key.is_empty() {
            "(not set)"
        } else {
            "********"
        };

        writeln!(f, "debug:                  {}", self.debug)?;
        writeln!(f, "log_json:               {}", self.log_json)?;
        writeln!(f, "gemini.model:           {}", self.gemini.model)?;
        writeln!(f, "gemini.endpoint:        {}", self.gemini.endpoint)?;
        writeln!(f, "gemini.api_key:         {}", api_key)?;
        writeln!(f, "store_path:             {}", self.store_path.display())?;
        writeln!(f, "schedule_interval_secs: {}", self.schedule_interval_secs)?;
        writeln!(f, "custom prompt:          {}", self.prompt.is_some())?;
        write!(
            f,
            "retry:                  {} attempts, {}ms initial, {}ms max, x{}, {} jitter",
            self.retry.max_attempts,
            self.retry.initial_delay_ms,
            self.retry.max_delay_ms,
            self.retry.backoff_multiplier,
            self.retry.jitter_factor
        )
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("phrases.json"))
        .unwrap_or_else(|| PathBuf::from("phrases.json"))
}

/// Load configuration from multiple sources with priority order:
/// 1. Environment variables
/// 2. Configuration file
/// 3. Default values
pub async fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = load_config_no_validation(path).await?;

    // Validate configuration
    config.validate()?;

    Ok(config)
}

/// Load configuration without validation (for config commands)
pub async fn load_config_no_validation(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::get_config_path()?,
    };
    let mut config = load_file_or_default(&config_path).await?;

    // Override with environment variables
    load_from_env(&mut config);

    Ok(config)
}

/// Contents of the config file alone, defaults when it does not exist
pub async fn load_file_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_from_file(path).await
    } else {
        Ok(Config::default())
    }
}

async fn load_from_file(path: &Path) -> Result<Config> {
    let contents = tokio::fs::read_to_string(path).await?;

    // Try to parse as TOML first, then JSON as fallback
    if let Ok(config) = toml::from_str::<Config>(&contents) {
        return Ok(config);
    }

    let config = serde_json::from_str::<Config>(&contents).map_err(|e| {
        PhraseError::config(format!(
            "Failed to parse {} as TOML or JSON: {}",
            path.display(),
            e
        ))
    })?;
    Ok(config)
}

fn load_from_env(config: &mut Config) {
    apply_env_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides using `lookup` to read variables
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("DEBUG") {
        config.debug = value.to_lowercase() == "true" || value == "1";
    }

    if let Some(value) = lookup("GEMINI_API_KEY") {
        config.gemini.api_key = value;
    }

    if let Some(value) = lookup("GEMINI_MODEL") {
        config.gemini.model = value;
    }

    if let Some(value) = lookup("GEMINI_ENDPOINT") {
        config.gemini.endpoint = value;
    }

    if let Some(value) = lookup("PHRASE_STORE_PATH") {
        config.store_path = PathBuf::from(value);
    }

    if let Some(value) = lookup("PHRASE_SCHEDULE_INTERVAL") {
        if let Ok(seconds) = value.parse::<u64>() {
            config.schedule_interval_secs = seconds;
        }
    }

    if let Some(value) = lookup("PHRASE_RETRY_MAX_ATTEMPTS") {
        if let Ok(attempts) = value.parse::<u32>() {
            config.retry.max_attempts = attempts;
        }
    }
}

pub async fn save_config(config: &Config, path: &Path) -> Result<()> {
    // Create parent directories if they don't exist
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Serialize to TOML format
    let contents = toml::to_string_pretty(config)
        .map_err(|e| PhraseError::config(format!("Failed to serialize config: {}", e)))?;

    tokio::fs::write(path, contents).await?;

    Ok(())
}

/// Write a default config file unless one exists. Returns whether a file
/// was written.
pub async fn init_default_config(path: &Path) -> Result<bool> {
    // Don't overwrite existing configuration
    if path.exists() {
        return Ok(false);
    }

    save_config(&Config::default(), path).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.require_api_key().is_err());
        assert_eq!(config.schedule_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_validate_rejects_bad_retry_settings() {
        let mut config = Config::default();
        config.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schedule_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_request_timeout() {
        let mut config = Config::default();
        config.gemini.request_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(PhraseError::ConfigError(msg)) if msg.contains("request_timeout_secs")
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DEBUG", "1"),
            ("GEMINI_API_KEY", "secret"),
            ("PHRASE_STORE_PATH", "/tmp/phrases.json"),
            ("PHRASE_SCHEDULE_INTERVAL", "3600"),
            ("PHRASE_RETRY_MAX_ATTEMPTS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert!(config.debug);
        assert_eq!(config.gemini.api_key, "secret");
        assert_eq!(config.store_path, PathBuf::from("/tmp/phrases.json"));
        assert_eq!(config.schedule_interval_secs, 3600);
        // unparsable values are ignored
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_display_masks_api_key() {
        let mut config = Config::default();
        config.gemini.api_key = "super-secret".to_string();
        let rendered = config.to_string();
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("********"));
    }

    #[tokio::test]
    async fn test_init_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dailyphrase").join("config.toml");

        assert!(init_default_config(&path).await.unwrap());
        assert!(!init_default_config(&path).await.unwrap());

        let loaded = load_from_file(&path).await.unwrap();
        assert_eq!(loaded.retry, RetrySettings::default());
        assert_eq!(loaded.gemini.model, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_partial_toml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "schedule_interval_secs = 60\n\n[retry]\nmax_attempts = 2\n")
            .await
            .unwrap();

        let loaded = load_from_file(&path).await.unwrap();
        assert_eq!(loaded.schedule_interval_secs, 60);
        assert_eq!(loaded.retry.max_attempts, 2);
        assert_eq!(loaded.retry.max_delay_ms, 10_000);
    }
}
