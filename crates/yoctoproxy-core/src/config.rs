/*!
 * Configuration management for yoctoproxy.
 *
 * Settings are layered: built-in defaults, then an optional file, then
 * environment variables (`PREFIX__SECTION__KEY`).
 */
use std::path::Path;
use std::sync::Arc;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Hub registration and device polling
    #[serde(default)]
    pub hub: HubConfig,

    /// Proxy registry behaviour
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application environment (development, production, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to print the event target
    #[serde(default = "default_true")]
    pub with_target: bool,
}

/// Hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Hub URLs handed to the hardware library ("usb", "192.168.1.10", ...)
    #[serde(default = "default_hub_urls")]
    pub urls: Vec<String>,

    /// Interval between device list updates
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout for one hub registration attempt
    #[serde(default = "default_register_timeout_ms")]
    pub register_timeout_ms: u64,

    /// Retries after a failed hub registration
    #[serde(default = "default_register_retries")]
    pub register_retries: usize,
}

/// Proxy registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Capacity of each event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Let unnamed placeholder proxies bind to the first matching arrival
    #[serde(default = "default_true")]
    pub adopt_placeholders: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            urls: default_hub_urls(),
            poll_interval_ms: default_poll_interval_ms(),
            register_timeout_ms: default_register_timeout_ms(),
            register_retries: default_register_retries(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            adopt_placeholders: true,
        }
    }
}

fn default_app_name() -> String {
    "yoctoproxy".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_hub_urls() -> Vec<String> {
    vec!["usb".to_string()]
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_register_timeout_ms() -> u64 {
    3000
}

fn default_register_retries() -> usize {
    2
}

fn default_event_capacity() -> usize {
    crate::event::DEFAULT_CHANNEL_CAPACITY
}

impl Config {
    /// Check values the deserializer cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if let Some(pos) = self.hub.urls.iter().position(|u| u.trim().is_empty()) {
            return Err(Error::config(format!("hub.urls[{}] is empty", pos)));
        }
        if self.hub.poll_interval_ms == 0 {
            return Err(Error::config("hub.poll_interval_ms must be greater than zero"));
        }
        if self.proxy.event_capacity == 0 {
            return Err(Error::config("proxy.event_capacity must be greater than zero"));
        }
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        let mut config_builder = ConfigLib::builder();

        let default_config = Config::default();
        config_builder = config_builder.add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("hub.urls"),
            );
        }

        let config_lib = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        let mut config: Config = config_lib
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        if let Some(override_config) = self.override_with {
            config = override_config;
        }

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }
}

/// A thread-safe reference to a configuration
#[derive(Debug, Clone)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.app_name, "yoctoproxy");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.hub.urls, vec!["usb".to_string()]);
        assert_eq!(config.hub.poll_interval_ms, 500);
        assert!(config.proxy.adopt_placeholders);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.general.app_name, "yoctoproxy");
        assert_eq!(config.hub.register_retries, 2);
    }

    #[test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("config.toml");

        fs::write(
            &file_path,
            r#"
                [general]
                app_name = "bench-rig"

                [logging]
                level = "debug"

                [hub]
                urls = ["usb", "192.168.1.42"]
                poll_interval_ms = 250

                [proxy]
                adopt_placeholders = false
            "#,
        )?;

        let config = ConfigBuilder::new().with_config_file(&file_path).build()?;

        assert_eq!(config.general.app_name, "bench-rig");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.hub.urls, vec!["usb".to_string(), "192.168.1.42".to_string()]);
        assert_eq!(config.hub.poll_interval_ms, 250);
        assert!(!config.proxy.adopt_placeholders);
        // untouched keys keep their defaults
        assert_eq!(config.hub.register_timeout_ms, 3000);

        Ok(())
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = ConfigBuilder::new()
            .with_config_file(dir.path().join("absent.toml"))
            .build()?;
        assert_eq!(config.general.app_name, "yoctoproxy");
        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("YPTEST__GENERAL__APP_NAME", "env-app");
        env::set_var("YPTEST__HUB__POLL_INTERVAL_MS", "125");

        let config = ConfigBuilder::new().with_environment_prefix("yptest").build()?;

        assert_eq!(config.general.app_name, "env-app");
        assert_eq!(config.hub.poll_interval_ms, 125);

        env::remove_var("YPTEST__GENERAL__APP_NAME");
        env::remove_var("YPTEST__HUB__POLL_INTERVAL_MS");

        Ok(())
    }

    #[test]
    fn test_hub_urls_from_env_list() -> Result<()> {
        env::set_var("YPURLS__HUB__URLS", "usb,10.0.0.2");

        let config = ConfigBuilder::new().with_environment_prefix("ypurls").build()?;
        assert_eq!(config.hub.urls, vec!["usb".to_string(), "10.0.0.2".to_string()]);
        assert!(config.validate().is_ok());

        env::remove_var("YPURLS__HUB__URLS");

        Ok(())
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = Config::default();
        config.hub.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let result = ConfigBuilder::new().override_with(config).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_blank_hub() {
        let mut config = Config::default();
        config.hub.urls.push("  ".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hub.urls[1]"));
    }

    #[test]
    fn test_to_toml_round_trips_through_builder() -> Result<()> {
        let mut config = Config::default();
        config.general.app_name = "rendered".to_string();
        let rendered = config.to_toml()?;
        assert!(rendered.contains("[hub]"));

        let dir = tempdir()?;
        let file_path = dir.path().join("rendered.toml");
        fs::write(&file_path, rendered)?;

        let loaded = ConfigBuilder::new().with_config_file(&file_path).build()?;
        assert_eq!(loaded.general.app_name, "rendered");
        Ok(())
    }

    #[test]
    fn test_shared_config() {
        let shared = SharedConfig::new(Config::default());
        let shared2 = shared.clone();
        assert_eq!(shared2.get().general.app_name, "yoctoproxy");
        assert_eq!(shared.as_ref().proxy.event_capacity, 1024);
    }
}
