//! Configuration management
//!
//! Configuration is loaded from an optional YAML file merged with
//! `MODKEY_`-prefixed environment variables (`__` separates nesting levels,
//! e.g. `MODKEY_KEYS__ALLOW_CUSTOM_KEY=false`).

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key subsystem configuration
    pub keys: KeysConfig,
    /// Identity provider configuration
    pub provider: ProviderConfig,
}

/// Key issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// User ids allowed to apply admin overrides
    pub admin_user_ids: Vec<i64>,
    /// Whether non-admin callers may create custom keys
    pub allow_custom_key: bool,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            admin_user_ids: Vec::new(),
            allow_custom_key: true,
        }
    }
}

/// Identity provider (Discord-shaped OAuth) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider API base URL
    pub api_base: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Per-request timeout for provider calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Retry behavior for transient network failures
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "/login/discord/callback".to_string(),
            request_timeout: Duration::from_secs(8),
            retry: RetryConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Token exchange endpoint (`POST`, form-encoded).
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api_base.trim_end_matches('/'))
    }

    /// Authenticated user profile endpoint (`GET`, bearer token).
    #[must_use]
    pub fn user_info_url(&self) -> String {
        format!("{}/users/@me", self.api_base.trim_end_matches('/'))
    }
}

/// Bounded retry configuration for provider network failures.
///
/// Only transport-level failures are retried; HTTP error statuses (including
/// 429) are mapped to results immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts (including the first)
    pub max_attempts: u32,
    /// Initial backoff delay
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Backoff cap
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("MODKEY_").split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }
}
