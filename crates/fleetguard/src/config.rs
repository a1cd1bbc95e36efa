//! Configuration management for fleetguard.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::alerts::SweepSettings;
use crate::error::{Error, Result};
use crate::policy::{
    DEDUPE_WINDOW_HOURS, MAX_ALERT_DAYS, MAX_DEDUPE_WINDOW_HOURS, PART107_ALERT_DAYS,
    REGISTRATION_ALERT_DAYS,
};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "fleetguard";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "fleet.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (`FLEETGUARD_<SECTION>__<KEY>`)
/// 2. TOML config file at `~/.config/fleetguard/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Expiry alert configuration.
    pub alerts: AlertsConfig,
    /// Cron trigger configuration.
    pub cron: CronConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/fleetguard/fleet.db`
    pub database_path: Option<PathBuf>,
}

/// Expiry alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Days before registration expiry on which to alert.
    pub registration_days: Vec<i64>,
    /// Days before Part 107 expiry on which to alert.
    pub certificate_days: Vec<i64>,
    /// Hours during which a repeat alert is suppressed.
    pub dedupe_window_hours: i64,
}

/// Cron trigger configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronConfig {
    /// Shared secret expected as `Authorization: Bearer <secret>`.
    /// Requests are refused while unset. Never serialized or debug-printed.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Address the HTTP trigger listens on.
    pub bind_address: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            registration_days: REGISTRATION_ALERT_DAYS.to_vec(),
            certificate_days: PART107_ALERT_DAYS.to_vec(),
            dedupe_window_hours: DEDUPE_WINDOW_HOURS,
        }
    }
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            secret: None,
            bind_address: "127.0.0.1:8787".to_string(),
        }
    }
}

impl std::fmt::Debug for CronConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("bind_address", &self.bind_address)
            .finish()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `FLEETGUARD_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FLEETGUARD_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        validate_distances("alerts.registration_days", &self.alerts.registration_days)?;
        validate_distances("alerts.certificate_days", &self.alerts.certificate_days)?;

        if !(1..=MAX_DEDUPE_WINDOW_HOURS).contains(&self.alerts.dedupe_window_hours) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "alerts.dedupe_window_hours must be in 1..={MAX_DEDUPE_WINDOW_HOURS}, got {}",
                    self.alerts.dedupe_window_hours
                ),
            });
        }

        if self.cron.bind_address.parse::<SocketAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!("invalid cron.bind_address: {}", self.cron.bind_address),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Sweep settings derived from the alerts section.
    #[must_use]
    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            registration_days: self.alerts.registration_days.clone(),
            certificate_days: self.alerts.certificate_days.clone(),
            dedupe_window_hours: self.alerts.dedupe_window_hours,
        }
    }

    /// The cron bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.cron
            .bind_address
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid cron.bind_address: {}", self.cron.bind_address),
            })
    }
}

fn validate_distances(name: &str, days: &[i64]) -> Result<()> {
    if days.is_empty() {
        return Err(Error::ConfigValidation {
            message: format!("{name} must not be empty"),
        });
    }
    if let Some(bad) = days.iter().find(|d| !(1..=MAX_ALERT_DAYS).contains(*d)) {
        return Err(Error::ConfigValidation {
            message: format!("{name} must contain day counts in 1..={MAX_ALERT_DAYS}, got {bad}"),
        });
    }
    Ok(())
}
