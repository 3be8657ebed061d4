//! TOML Configuration File Support
//!
//! Centralized configuration loading, supporting a TOML configuration file at
//! `~/.config/digipal/digipal.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/digipal/digipal.toml` (typically `~/.config/digipal/digipal.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! endpoint = "http://localhost:3000/chat"
//! timeout_secs = 10
//! max_retries = 2
//! retry_delay_ms = 1000
//!
//! [pet]
//! name = "DigiPal"
//! type = "cactus"
//!
//! [speech]
//! enabled = true
//! language = "en-US"
//!
//! [stats]
//! decay_tick_secs = 60
//! hunger_per_hour = 5.0
//! hydration_per_hour = 8.0
//! activity_per_hour = 3.0
//! mood_per_hour = 4.0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::RetryPolicy;
use crate::pet::{DecayRates, PetType, DEFAULT_DECAY_TICK, DEFAULT_PET_NAME};

/// Default chat endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/chat";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Chat endpoint URL
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Retries after the first attempt
    pub max_retries: Option<u32>,

    /// Retry delay unit in milliseconds
    pub retry_delay_ms: Option<u64>,
}

/// Pet section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PetToml {
    /// Pet name
    pub name: Option<String>,

    /// Pet archetype
    #[serde(rename = "type")]
    pub pet_type: Option<String>,

    /// Body color
    pub color: Option<String>,
}

/// Speech section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechToml {
    /// Whether replies are narrated
    pub enabled: Option<bool>,

    /// Narration language
    pub language: Option<String>,
}

/// Stats section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsToml {
    /// Decay ticker period in seconds
    pub decay_tick_secs: Option<u64>,

    /// Hunger decay per hour
    pub hunger_per_hour: Option<f64>,

    /// Hydration decay per hour
    pub hydration_per_hour: Option<f64>,

    /// Activity decay per hour
    pub activity_per_hour: Option<f64>,

    /// Mood decay per hour
    pub mood_per_hour: Option<f64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DigipalToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Pet configuration section
    pub pet: PetToml,

    /// Speech configuration section
    pub speech: SpeechToml,

    /// Stats configuration section
    pub stats: StatsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct DigipalConfig {
    /// Chat endpoint URL
    pub endpoint: String,

    /// Timeout and retry behavior for backend calls
    pub retry: RetryPolicy,

    /// Name of the starting pet
    pub pet_name: String,

    /// Archetype of the starting pet
    pub pet_type: PetType,

    /// Body color override for the starting pet
    pub pet_color: Option<String>,

    /// Whether replies are narrated
    pub speech_enabled: bool,

    /// Narration language
    pub speech_language: String,

    /// Decay ticker period
    pub decay_tick: Duration,

    /// Decay rates
    pub decay_rates: DecayRates,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for DigipalConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
            pet_name: DEFAULT_PET_NAME.to_string(),
            pet_type: PetType::default(),
            pet_color: None,
            speech_enabled: true,
            speech_language: "en-US".to_string(),
            decay_tick: DEFAULT_DECAY_TICK,
            decay_rates: DecayRates::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl DigipalConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values that parse but make no sense
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend endpoint must not be empty".to_string(),
            ));
        }
        if self.retry.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "backend timeout must be positive".to_string(),
            ));
        }
        if self.decay_tick.is_zero() {
            return Err(ConfigError::ValidationError(
                "decay tick must be positive".to_string(),
            ));
        }
        let rates = [
            ("hunger", self.decay_rates.hunger),
            ("hydration", self.decay_rates.hydration),
            ("activity", self.decay_rates.activity),
            ("mood", self.decay_rates.mood),
        ];
        for (name, rate) in rates {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} decay rate must be a non-negative number, got {rate}"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/digipal/digipal.toml` or
/// `~/.config/digipal/digipal.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("digipal").join("digipal.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// resulting values are invalid. A missing config file is not an error.
pub fn load_config() -> Result<DigipalConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<DigipalConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration, reading environment variables through `env`
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<DigipalConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = DigipalConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: DigipalToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn parse_pet_type(value: &str) -> Result<PetType, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("unknown pet type '{value}'")))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut DigipalConfig, toml: &DigipalToml) -> Result<(), ConfigError> {
    // Backend settings
    if let Some(ref endpoint) = toml.backend.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if let Some(secs) = toml.backend.timeout_secs {
        config.retry.timeout = Duration::from_secs(secs);
    }
    if let Some(retries) = toml.backend.max_retries {
        config.retry.max_retries = retries;
    }
    if let Some(ms) = toml.backend.retry_delay_ms {
        config.retry.base_delay = Duration::from_millis(ms);
    }

    // Pet settings
    if let Some(ref name) = toml.pet.name {
        config.pet_name.clone_from(name);
    }
    if let Some(ref pet_type) = toml.pet.pet_type {
        config.pet_type = parse_pet_type(pet_type)?;
    }
    if toml.pet.color.is_some() {
        config.pet_color.clone_from(&toml.pet.color);
    }

    // Speech settings
    if let Some(enabled) = toml.speech.enabled {
        config.speech_enabled = enabled;
    }
    if let Some(ref language) = toml.speech.language {
        config.speech_language.clone_from(language);
    }

    // Stats settings
    if let Some(secs) = toml.stats.decay_tick_secs {
        config.decay_tick = Duration::from_secs(secs);
    }
    if let Some(rate) = toml.stats.hunger_per_hour {
        config.decay_rates.hunger = rate;
    }
    if let Some(rate) = toml.stats.hydration_per_hour {
        config.decay_rates.hydration = rate;
    }
    if let Some(rate) = toml.stats.activity_per_hour {
        config.decay_rates.activity = rate;
    }
    if let Some(rate) = toml.stats.mood_per_hour {
        config.decay_rates.mood = rate;
    }

    Ok(())
}

/// Apply environment variable overrides to the config
///
/// Unparseable values are ignored with a warning.
fn apply_env_config<F>(config: &mut DigipalConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = env("DIGIPAL_ENDPOINT") {
        config.endpoint = endpoint;
        config.source = ConfigSource::Env;
    }

    if let Some(timeout) = env("DIGIPAL_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.retry.timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring invalid DIGIPAL_TIMEOUT_SECS");
        }
    }

    if let Some(retries) = env("DIGIPAL_MAX_RETRIES") {
        if let Ok(n) = retries.parse::<u32>() {
            config.retry.max_retries = n;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %retries, "Ignoring invalid DIGIPAL_MAX_RETRIES");
        }
    }

    if let Some(delay) = env("DIGIPAL_RETRY_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.retry.base_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %delay, "Ignoring invalid DIGIPAL_RETRY_DELAY_MS");
        }
    }

    if let Some(name) = env("DIGIPAL_PET_NAME") {
        config.pet_name = name;
        config.source = ConfigSource::Env;
    }

    if let Some(pet_type) = env("DIGIPAL_PET_TYPE") {
        if let Ok(pet_type) = pet_type.parse::<PetType>() {
            config.pet_type = pet_type;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %pet_type, "Ignoring invalid DIGIPAL_PET_TYPE");
        }
    }

    if let Some(enabled) = env("DIGIPAL_SPEECH") {
        config.speech_enabled = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }

    if let Some(tick) = env("DIGIPAL_DECAY_TICK_SECS") {
        if let Ok(secs) = tick.parse::<u64>() {
            config.decay_tick = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %tick, "Ignoring invalid DIGIPAL_DECAY_TICK_SECS");
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub endpoint: Option<String>,

    /// Pet name override
    pub pet_name: Option<String>,

    /// Pet type override
    pub pet_type: Option<PetType>,

    /// Speech override
    pub speech_enabled: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set pet name override
    #[must_use]
    pub fn with_pet_name(mut self, name: String) -> Self {
        self.pet_name = Some(name);
        self
    }

    /// Set pet type override
    #[must_use]
    pub fn with_pet_type(mut self, pet_type: PetType) -> Self {
        self.pet_type = Some(pet_type);
        self
    }

    /// Set speech override
    #[must_use]
    pub fn with_speech_enabled(mut self, enabled: bool) -> Self {
        self.speech_enabled = Some(enabled);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut DigipalConfig) {
        if self.endpoint.is_some()
            || self.pet_name.is_some()
            || self.pet_type.is_some()
            || self.speech_enabled.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref endpoint) = self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(ref name) = self.pet_name {
            config.pet_name.clone_from(name);
        }
        if let Some(pet_type) = self.pet_type {
            config.pet_type = pet_type;
        }
        if let Some(enabled) = self.speech_enabled {
            config.speech_enabled = enabled;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
