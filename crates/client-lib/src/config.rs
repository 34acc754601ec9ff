// ============================
// quickbite-client-lib/src/config.rs
// ============================
//! Configuration management.
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Client settings. Components never compute their own endpoints; every
/// URL and threshold comes from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the REST API, e.g. `https://api.quickbite.app`
    pub api_base_url: String,
    /// Realtime websocket endpoint, e.g. `wss://api.quickbite.app/realtime`
    pub realtime_url: String,
    /// Directory for durable client state (credentials, selected address)
    pub data_dir: PathBuf,
    /// Log level fallback when `RUST_LOG` is unset
    pub log_level: String,
    /// Per-kind cap on buffered realtime updates; oldest entries are
    /// evicted past this
    pub update_buffer_capacity: usize,
    /// Outbound HTTP request timeout in seconds
    pub http_timeout_secs: u64,
    /// Location watch thresholds
    pub location: LocationSettings,
}

/// Thresholds handed to the position provider's watch stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSettings {
    /// Minimum movement before a new sample is emitted, in metres
    pub min_displacement_m: f64,
    /// Target interval between samples in seconds
    pub interval_secs: u64,
    /// Hard lower bound between samples in seconds
    pub fastest_interval_secs: u64,
    /// One-shot fix acquisition timeout in seconds
    pub fix_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            realtime_url: "ws://127.0.0.1:8080/realtime".to_string(),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            update_buffer_capacity: 256,
            http_timeout_secs: 30,
            location: LocationSettings::default(),
        }
    }
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            min_displacement_m: 10.0,
            interval_secs: 5,
            fastest_interval_secs: 2,
            fix_timeout_secs: 15,
        }
    }
}

impl Settings {
    /// Load settings from defaults, then `quickbite.toml`, then
    /// `QUICKBITE_`-prefixed environment variables (nested keys separated
    /// by `__`).
    pub fn load() -> Result<Self, AppError> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("quickbite.toml"))
            .merge(Env::prefixed("QUICKBITE_").split("__"))
            .extract()
            .map_err(|e| AppError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations that would misdirect or stall the client
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "api_base_url must be http(s), got {:?}",
                self.api_base_url
            )));
        }
        if !self.realtime_url.starts_with("ws://") && !self.realtime_url.starts_with("wss://") {
            return Err(AppError::Config(format!(
                "realtime_url must be ws(s), got {:?}",
                self.realtime_url
            )));
        }
        if self.update_buffer_capacity == 0 {
            return Err(AppError::Config(
                "update_buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.location.fastest_interval_secs > self.location.interval_secs {
            return Err(AppError::Config(
                "location.fastest_interval_secs must not exceed location.interval_secs"
                    .to_string(),
            ));
        }
        if self.location.fix_timeout_secs == 0 {
            return Err(AppError::Config(
                "location.fix_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl LocationSettings {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn fastest_interval(&self) -> Duration {
        Duration::from_secs(self.fastest_interval_secs)
    }

    #[must_use]
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_secs(self.fix_timeout_secs)
    }
}
