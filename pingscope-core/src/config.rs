use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Coordinate;
use crate::normalize::DEFAULT_MAX_PINGS;

pub const ENV_API_URL: &str = "PINGSCOPE_API_URL";
pub const ENV_TIMEOUT_MS: &str = "PINGSCOPE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_pings")]
    pub max_pings: usize,
    #[serde(default)]
    pub map: MapConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    /// Viewport center when there is nothing to fit to.
    #[serde(default = "default_center")]
    pub default_center: Coordinate,
    #[serde(default = "default_zoom")]
    pub default_zoom: u8,
    #[serde(default = "default_fit_padding_px")]
    pub fit_padding_px: u32,
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            timeout_ms: default_timeout_ms(),
            max_pings: default_max_pings(),
            map: MapConfig::default(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: default_center(),
            default_zoom: default_zoom(),
            fit_padding_px: default_fit_padding_px(),
            overlay_opacity: default_overlay_opacity(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = fs::read(path)?;
        let cfg: Config = serde_json::from_slice(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies `PINGSCOPE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            let url = url.trim();
            if !url.is_empty() {
                self.api_base_url = url.to_string();
            }
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                reason: format!("{ENV_TIMEOUT_MS} must be an integer, got {raw:?}"),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(invalid("apiBaseUrl must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeoutMs must be > 0"));
        }
        if self.max_pings == 0 {
            return Err(invalid("maxPings must be > 0"));
        }
        if !self.map.default_center.is_valid() {
            return Err(invalid("map.defaultCenter is not a valid WGS84 coordinate"));
        }
        if !(0.0..=1.0).contains(&self.map.overlay_opacity) {
            return Err(invalid("map.overlayOpacity must be within [0, 1]"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_string(),
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_pings() -> usize {
    DEFAULT_MAX_PINGS
}

fn default_center() -> Coordinate {
    Coordinate::new(39.8283, -98.5795)
}

fn default_zoom() -> u8 {
    4
}

fn default_fit_padding_px() -> u32 {
    40
}

fn default_overlay_opacity() -> f64 {
    0.2
}
