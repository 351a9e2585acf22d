use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::provider::ProviderId;

pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_GEOCODE_URL: &str = "https://api.opencagedata.com/geocode/v1/json";
pub const DEFAULT_TIMEZONE_URL: &str = "https://api.timezonedb.com/v2.1/get-time-zone";
pub const DEFAULT_SUGGEST_URL: &str = "https://wft-geo-db.p.rapidapi.com/v1/geo/cities";

/// Configuration for a single upstream provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
    /// Upper bound on identities with a live counter; least recently seen are evicted.
    pub max_tracked_identities: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 10 * 60,
            max_requests: 100,
            max_tracked_identities: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub weather_url: String,
    pub geocode_url: String,
    pub timezone_url: String,
    pub suggest_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            timezone_url: DEFAULT_TIMEZONE_URL.to_string(),
            suggest_url: DEFAULT_SUGGEST_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub request_timeout_secs: u64,
    /// Quiet period before a city-suggestion lookup fires.
    pub suggest_debounce_ms: u64,
    pub rate_limit: RateLimitSettings,
    pub endpoints: Endpoints,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 8,
            suggest_debounce_ms: 300,
            rate_limit: RateLimitSettings::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl GatewaySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn suggest_debounce(&self) -> Duration {
        Duration::from_millis(self.suggest_debounce_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=30).contains(&self.request_timeout_secs) {
            bail!(
                "gateway.request_timeout_secs must be between 1 and 30, got {}",
                self.request_timeout_secs
            );
        }
        if self.rate_limit.window_secs == 0 {
            bail!("gateway.rate_limit.window_secs must be greater than zero");
        }
        if self.rate_limit.max_requests == 0 {
            bail!("gateway.rate_limit.max_requests must be greater than zero");
        }
        if self.rate_limit.max_tracked_identities == 0 {
            bail!("gateway.rate_limit.max_tracked_identities must be greater than zero");
        }
        Ok(())
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl Config {
    /// Load config from disk (or defaults if absent), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|name| std::env::var(name).ok());
        cfg.gateway.validate()?;
        Ok(cfg)
    }

    /// File contents only, without environment overrides. Use this before `save`.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Credentials from the environment take precedence over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for id in ProviderId::all() {
            if let Some(key) = lookup(id.env_var()).filter(|k| !k.trim().is_empty()) {
                self.upsert_provider_api_key(*id, key.trim().to_string());
            }
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-gateway", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
    }

    /// Like [`Config::provider_api_key`] but with a hint for the CLI user.
    pub fn require_api_key(&self, id: ProviderId) -> Result<&str> {
        self.provider_api_key(id).ok_or_else(|| {
            anyhow!(
                "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` or set {}.",
                id.env_var()
            )
        })
    }
}
