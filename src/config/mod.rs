//! Configuration management for the harvester.
//!
//! Configuration is read from `~/.config/harvester/config.toml` unless a path
//! is given explicitly. If the default file doesn't exist, a commented
//! template is written. Credentials can be supplied through the environment.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::{ActivityMode, IntervalPolicy};
use crate::source::DEFAULT_PAGE_SIZE;

const ENV_SOURCE_URL: &str = "HARVESTER_SOURCE_URL";
const ENV_CHANNEL_USERNAME: &str = "HARVESTER_CHANNEL_USERNAME";
const ENV_PHONE_NUMBER: &str = "HARVESTER_PHONE_NUMBER";
const ENV_DB_PATH: &str = "HARVESTER_DB_PATH";

const MAX_INTERVAL_SECS: f64 = 86_400.0;
const MAX_SLOW_DOWN_FACTOR: f64 = 10.0;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub polling: PollingConfig,
    pub store: StoreConfig,
}

/// Connection to the client gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub channel_username: String,
    pub phone_number: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            channel_username: String::new(),
            phone_number: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub initial_interval_secs: f64,
    pub min_interval_secs: f64,
    pub max_interval_secs: f64,
    /// Multiplier applied when a cycle found new data (0 < f < 1)
    pub speed_up_factor: f64,
    /// Multiplier applied after a quiet period (f > 1)
    pub slow_down_factor: f64,
    pub idle_threshold_secs: u64,
    pub readiness_probe_secs: u64,
    pub page_size: usize,
    pub activity: ActivityMode,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_secs: 5.0,
            min_interval_secs: 1.0,
            max_interval_secs: 60.0,
            speed_up_factor: 0.75,
            slow_down_factor: 1.5,
            idle_threshold_secs: 300,
            readiness_probe_secs: 5,
            page_size: DEFAULT_PAGE_SIZE,
            activity: ActivityMode::NewData,
        }
    }
}

impl PollingConfig {
    /// Values that cannot form a `Duration` fall back to the defaults;
    /// `Config::validate` rejects them before this point.
    pub fn interval_policy(&self) -> IntervalPolicy {
        let defaults = IntervalPolicy::default();
        let secs = |value: f64, fallback: Duration| {
            Duration::try_from_secs_f64(value).unwrap_or(fallback)
        };
        IntervalPolicy {
            initial: secs(self.initial_interval_secs, defaults.initial),
            min: secs(self.min_interval_secs, defaults.min),
            max: secs(self.max_interval_secs, defaults.max),
            speed_up: self.speed_up_factor,
            slow_down: self.slow_down_factor,
            idle_threshold: Duration::from_secs(self.idle_threshold_secs),
        }
    }

    pub fn readiness_probe(&self) -> Duration {
        Duration::from_secs(self.readiness_probe_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file (None = platform data directory)
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file is created from
    /// the template. Environment overrides are applied and the result is
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let config_path = Self::default_config_path()?;
                if !config_path.exists() {
                    Self::create_default_config(&config_path)?;
                }
                Self::load_from(&config_path)?
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/harvester/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("harvester").join("config.toml"))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_SOURCE_URL) {
            self.source.base_url = url;
        }
        if let Some(username) = lookup(ENV_CHANNEL_USERNAME) {
            self.source.channel_username = username;
        }
        if let Some(phone) = lookup(ENV_PHONE_NUMBER) {
            self.source.phone_number = Some(phone);
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.store.path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        let p = &self.polling;

        if self.source.channel_username.trim().is_empty() {
            return invalid("source.channel_username must be set");
        }
        if let Err(e) = url::Url::parse(&self.source.base_url) {
            return Err(ConfigError::Invalid(format!("source.base_url: {}", e)));
        }
        let numbers = [
            p.initial_interval_secs,
            p.min_interval_secs,
            p.max_interval_secs,
            p.speed_up_factor,
            p.slow_down_factor,
        ];
        if numbers.iter().any(|n| !n.is_finite()) {
            return invalid("polling intervals and factors must be finite numbers");
        }
        if !(p.min_interval_secs > 0.0 && p.min_interval_secs <= p.max_interval_secs) {
            return invalid("polling intervals must satisfy 0 < min <= max");
        }
        if p.initial_interval_secs < p.min_interval_secs
            || p.initial_interval_secs > p.max_interval_secs
        {
            return invalid("polling.initial_interval_secs must lie within [min, max]");
        }
        if !(p.speed_up_factor > 0.0 && p.speed_up_factor < 1.0) {
            return invalid("polling.speed_up_factor must be in (0, 1)");
        }
        if p.max_interval_secs > MAX_INTERVAL_SECS {
            return invalid("polling.max_interval_secs must be at most one day");
        }
        if !(p.slow_down_factor > 1.0 && p.slow_down_factor <= MAX_SLOW_DOWN_FACTOR) {
            return invalid("polling.slow_down_factor must be in (1, 10]");
        }
        if p.page_size == 0 {
            return invalid("polling.page_size must be at least 1");
        }

        Ok(())
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Harvester configuration
#
# Credentials may also come from the environment:
#   HARVESTER_SOURCE_URL, HARVESTER_CHANNEL_USERNAME,
#   HARVESTER_PHONE_NUMBER, HARVESTER_DB_PATH

[source]
# Client gateway hosting the upstream session
base_url = "http://127.0.0.1:8081"

# Public channel to harvest (without the leading @)
channel_username = ""

# Account phone number used to start authentication
# phone_number = "+15550100"

# Request timeout in seconds
timeout_secs = 10

[polling]
# Delay between cycles, in seconds
initial_interval_secs = 5.0
min_interval_secs = 1.0
max_interval_secs = 60.0

# Shrink the delay after a cycle with new data
speed_up_factor = 0.75

# Grow the delay once nothing arrived for idle_threshold_secs
slow_down_factor = 1.5
idle_threshold_secs = 300

# Delay between readiness probes while waiting for authentication
readiness_probe_secs = 5

# Items requested per cycle
page_size = 100

# What counts as activity for the idle threshold:
#   "new-data"    - the last cycle that stored new messages
#   "every-cycle" - the last completed cycle
activity = "new-data"

[store]
# Database file (default: platform data directory)
# path = "/var/lib/harvester/harvester.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
