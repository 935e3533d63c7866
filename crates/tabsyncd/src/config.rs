//! Coordinator configuration.
//!
//! Loaded from TOML. Every key is optional; missing keys take the defaults
//! below.
//!
//! ```toml
//! customer_paths = ["/CustomerScreenEntry.aspx"]
//! action_paths = ["/CustomerService/ActionScreen.aspx"]
//! main_paths = ["/Main.aspx"]
//! minimize_settle_ms = 200
//!
//! [keepalive]
//! load_delay_ms = 8000
//! close_delay_ms = 2000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use tabsync_core::PageMatcher;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TABSYNC_CONFIG";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL path prefixes for customer, action and main pages
    #[serde(flatten)]
    pub pages: PageMatcher,

    /// Delay before minimizing the action window
    pub minimize_settle_ms: u64,

    pub keepalive: KeepaliveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pages: PageMatcher::default(),
            minimize_settle_ms: 200,
            keepalive: KeepaliveConfig::default(),
        }
    }
}

/// Timings of a single keepalive visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Wait between opening the target tab and clicking it
    pub load_delay_ms: u64,
    /// Wait between clicking and closing the target tab
    pub close_delay_ms: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            load_delay_ms: 8000,
            close_delay_ms: 2000,
        }
    }
}

impl KeepaliveConfig {
    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.load_delay_ms)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}

impl Config {
    pub fn minimize_settle(&self) -> Duration {
        Duration::from_millis(self.minimize_settle_ms)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Loads the config named by `TABSYNC_CONFIG`, else the user config
    /// file, else the defaults.
    ///
    /// An explicitly named file must exist; the user config file is optional.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        match default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// `<config dir>/tabsync/config.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tabsync").join("config.toml"))
}
