//! Configuration loading for address-rs.

use crate::error::{Error, Result};
use crate::kinds::UnknownKindPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "ADDRESS_RS_CONFIG";

/// Environment variable overriding the geocoder API key.
pub const API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";

/// Default Google Geocoding API endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Configuration for address ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Whether an address with only `raw` set may be stored when no
    /// structured components can be resolved
    pub allow_dummy_addresses: bool,

    /// Handling of provider tags the kind registry does not know
    pub unknown_kinds: UnknownKindPolicy,

    /// Geocoder settings
    pub geocoder: GeocoderConfig,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            allow_dummy_addresses: true,
            unknown_kinds: UnknownKindPolicy::Ignore,
            geocoder: GeocoderConfig::default(),
        }
    }
}

/// Settings for the Google geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// API key sent with every request
    pub api_key: Option<String>,
    /// Endpoint of the geocoding API
    pub base_url: String,
    /// Region bias (ccTLD, e.g. "au")
    pub region: Option<String>,
    /// Request timeout
    pub timeout_seconds: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEOCODER_URL.to_string(),
            region: None,
            timeout_seconds: 60,
        }
    }
}

impl AddressConfig {
    /// Create a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use address_rs::AddressConfig;
    ///
    /// let config = AddressConfig::builder()
    ///     .allow_dummy_addresses(false)
    ///     .api_key("secret")
    ///     .build();
    /// assert!(!config.allow_dummy_addresses);
    /// ```
    pub fn builder() -> AddressConfigBuilder {
        AddressConfigBuilder::new()
    }

    /// Parse a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            Error::config_error(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Load the configuration from the default location.
    ///
    /// The file named by `ADDRESS_RS_CONFIG` wins, then
    /// `<config dir>/address-rs/config.toml`. Without a file the defaults are
    /// used. `GOOGLE_API_KEY` overrides the key from the file.
    pub fn load() -> Result<Self> {
        let config = match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading address configuration from {}", path.display());
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            if !key.trim().is_empty() {
                self.geocoder.api_key = Some(key);
            }
        }
        self
    }
}

/// Location of the configuration file, if one can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("address-rs").join("config.toml"))
}

/// Builder for AddressConfig.
#[derive(Debug, Clone)]
pub struct AddressConfigBuilder {
    config: AddressConfig,
}

impl AddressConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self {
            config: AddressConfig::default(),
        }
    }

    /// Set whether raw-only addresses may be stored.
    pub fn allow_dummy_addresses(mut self, enabled: bool) -> Self {
        self.config.allow_dummy_addresses = enabled;
        self
    }

    /// Set the unknown kind policy.
    pub fn unknown_kinds(mut self, policy: UnknownKindPolicy) -> Self {
        self.config.unknown_kinds = policy;
        self
    }

    /// Set the geocoder configuration.
    pub fn geocoder(mut self, geocoder: GeocoderConfig) -> Self {
        self.config.geocoder = geocoder;
        self
    }

    /// Set the geocoder API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.geocoder.api_key = Some(key.into());
        self
    }

    /// Set the geocoder timeout.
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.geocoder.timeout_seconds = seconds;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> AddressConfig {
        self.config
    }
}

impl Default for AddressConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
