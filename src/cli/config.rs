//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./cstation.toml or ./.cstation/config.toml
//! 2. User config: ~/.cstation/config.toml
//! 3. System config: /etc/cstation/config.toml
//! 4. Built-in defaults
//!
//! Flags and the `CSTATION_HOST` / `CSTATION_TOKEN` environment variables are
//! applied on top of whichever file wins.

use crate::auth::Credential;
use crate::env;
use crate::station::{PollPolicy, StationClient};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

type ConfigResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    /// 0 disables the deadline
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: env::poll::DEFAULT_INTERVAL.as_millis() as u64,
            timeout_secs: env::poll::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub host_url: String,
    pub request_timeout_secs: u64,
    pub poll: PollConfig,
    /// Session cookie; usually supplied through the environment instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            host_url: env::DEFAULT_HOST_URL.to_string(),
            request_timeout_secs: env::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            poll: PollConfig::default(),
            token: None,
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host_url: Option<String>,
    pub token: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl StationConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: StationConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(host_url) = overrides.host_url {
            self.host_url = host_url;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if let Some(interval_ms) = overrides.poll_interval_ms {
            self.poll.interval_ms = interval_ms;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.poll.timeout_secs = timeout_secs;
        }
        self
    }

    /// Intervals below [`env::poll::MIN_INTERVAL`] are raised to it.
    pub fn poll_policy(&self) -> PollPolicy {
        let mut interval = Duration::from_millis(self.poll.interval_ms);
        if interval < env::poll::MIN_INTERVAL {
            warn!(
                interval_ms = self.poll.interval_ms,
                "Poll interval too short, using {:?}",
                env::poll::MIN_INTERVAL
            );
            interval = env::poll::MIN_INTERVAL;
        }
        PollPolicy {
            interval,
            timeout: (self.poll.timeout_secs > 0).then(|| Duration::from_secs(self.poll.timeout_secs)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.token
            .as_deref()
            .map(Credential::from_cookie)
            .filter(|credential| !credential.is_empty())
    }

    /// Build the HTTP client this configuration describes.
    pub fn build_client(&self) -> crate::station::Result<StationClient> {
        let mut builder =
            StationClient::builder(self.host_url.clone()).timeout(self.request_timeout());
        match self.credential() {
            Some(credential) => builder = builder.credential(credential),
            None => warn!("No session token configured; requests will be unauthenticated"),
        }
        builder.build()
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> ConfigResult<StationConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return StationConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(StationConfig::default())
    }

    /// Load `explicit` if given, otherwise run discovery, then apply overrides.
    pub fn load(explicit: Option<&Path>, overrides: ConfigOverrides) -> ConfigResult<StationConfig> {
        let config = match explicit {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                StationConfig::from_toml_file(path)?
            }
            None => Self::discover_config()?,
        };
        Ok(config.with_overrides(overrides))
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::get_config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/cstation").join(env::CONFIG_FILE_NAME));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("cstation")
                    .join(env::CONFIG_FILE_NAME),
            );
        }

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> ConfigResult<PathBuf> {
        let home_dir = Self::get_home_dir().ok_or("Could not determine home directory")?;

        let config_dir = env::user_config_dir_path(&home_dir);
        let config_path = env::user_config_file_path(&home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            StationConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info(effective: &StationConfig) {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }

        println!();
        println!("Effective settings:");
        println!("  host_url: {}", effective.host_url);
        println!("  request_timeout_secs: {}", effective.request_timeout_secs);
        println!("  poll.interval_ms: {}", effective.poll.interval_ms);
        println!("  poll.timeout_secs: {}", effective.poll.timeout_secs);
        println!(
            "  token: {}",
            if effective.credential().is_some() {
                "set"
            } else {
                "not set"
            }
        );
    }
}
