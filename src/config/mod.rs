//! Configuration management for the Veracode API client

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::region::Region;
use crate::error::{ConfigError, Error, Result};

/// Environment variable holding the API key id
pub const ENV_API_KEY_ID: &str = "VERACODE_API_KEY_ID";
/// Environment variable holding the API key secret
pub const ENV_API_KEY_SECRET: &str = "VERACODE_API_KEY_SECRET";
/// Environment variable forcing a region
pub const ENV_REGION: &str = "VERACODE_REGION";
/// Environment variable overriding the REST base URL
pub const ENV_REST_BASE_URL: &str = "VERACODE_REST_BASE_URL";
/// Environment variable overriding the XML base URL
pub const ENV_XML_BASE_URL: &str = "VERACODE_XML_BASE_URL";

/// Client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Veracode API key id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,

    /// Veracode API key secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_secret: Option<String>,

    /// Region override; when absent the region is derived from the key id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,

    /// REST base URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_base_url: Option<String>,

    /// XML base URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_base_url: Option<String>,

    /// Retry and polling settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,
}

/// Retry and polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts for retryable statuses
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between retryable attempts, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Double the delay after every failed attempt
    #[serde(default)]
    pub exponential_backoff: bool,

    /// Cooldown between "not ready yet" polls, in seconds
    #[serde(default = "default_poll_cooldown_secs")]
    pub poll_cooldown_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_poll_cooldown_secs() -> u64 {
    120
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            exponential_backoff: false,
            poll_cooldown_secs: default_poll_cooldown_secs(),
        }
    }
}

impl RetrySettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn poll_cooldown(&self) -> Duration {
        Duration::from_secs(self.poll_cooldown_secs)
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("veracode-api-rs/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// API key pair handed to the signing collaborator
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key_id: String,
    pub api_key_secret: String,
}

impl Credentials {
    pub fn new(api_key_id: impl Into<String>, api_key_secret: impl Into<String>) -> Self {
        Self {
            api_key_id: api_key_id.into(),
            api_key_secret: api_key_secret.into(),
        }
    }
}

// Keep the secret out of debug logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key_id", &self.api_key_id)
            .field("api_key_secret", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".veracode").join("config.yaml"))
    }

    /// Load configuration from the default path, then apply `VERACODE_*`
    /// environment overrides. Without a file the environment alone is used.
    pub fn load() -> Result<Self> {
        Self::load_with_overrides(Self::default_path()?, |key| std::env::var(key).ok())
    }

    /// Load configuration from an optional path, falling back to the default.
    /// Environment overrides apply either way.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_with_overrides(PathBuf::from(p), |key| std::env::var(key).ok()),
            None => Self::load(),
        }
    }

    /// Load `path` and layer `lookup` overrides on top. A missing file yields
    /// the defaults plus overrides, unless that leaves no credentials.
    pub fn load_with_overrides<F>(path: PathBuf, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, from_file) = match Self::load_from(path) {
            Ok(config) => (config, true),
            Err(Error::Config(ConfigError::NotFound)) => (Config::default(), false),
            Err(err) => return Err(err),
        };
        config.apply_overrides(lookup)?;

        if !from_file && (config.api_key_id.is_none() || config.api_key_secret.is_none()) {
            return Err(ConfigError::NotFound.into());
        }
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Build configuration purely from the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // Credentials live in this file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Apply `VERACODE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty(ENV_API_KEY_ID) {
            self.api_key_id = Some(id);
        }
        if let Some(secret) = non_empty(ENV_API_KEY_SECRET) {
            self.api_key_secret = Some(secret);
        }
        if let Some(region) = non_empty(ENV_REGION) {
            self.region = Some(region.parse()?);
        }
        if let Some(url) = non_empty(ENV_REST_BASE_URL) {
            self.rest_base_url = Some(url);
        }
        if let Some(url) = non_empty(ENV_XML_BASE_URL) {
            self.xml_base_url = Some(url);
        }
        Ok(())
    }

    /// Credentials, failing if either half is missing
    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.api_key_id, &self.api_key_secret) {
            (Some(id), Some(secret)) => Ok(Credentials::new(id.clone(), secret.clone())),
            _ => Err(ConfigError::MissingCredentials.into()),
        }
    }
}
