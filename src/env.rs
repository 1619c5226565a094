//! Environment constants and path utilities for the Container Station client.
//!
//! This module centralizes the hardcoded API paths, protocol sentinels and
//! configuration file names used throughout the crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hidden directory holding local and per-user configuration
pub const CSTATION_DIR_NAME: &str = ".cstation";

/// Configuration file name inside [`CSTATION_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up directly in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "cstation.toml";

/// Host used when neither configuration nor flags name one
pub const DEFAULT_HOST_URL: &str = "http://localhost:19090";

/// Environment variable overriding the configured host URL
pub const HOST_ENV_VAR: &str = "CSTATION_HOST";

/// Environment variable carrying the session credential
pub const TOKEN_ENV_VAR: &str = "CSTATION_TOKEN";

/// Remote API surface
pub mod api {
    /// Versioned path prefix every endpoint lives under
    pub const PREFIX: &str = "container-station/api/v3";

    pub const OVERVIEW: &str = "overview";
    pub const TASKS: &str = "tasks";
    pub const CONTAINERS: &str = "containers";
    pub const APPS: &str = "apps";
    pub const APPS_COMPOSE: &str = "apps/compose";
    pub const VOLUMES: &str = "volumes";
}

/// Protocol sentinels reported by the remote system
pub mod status {
    /// Task state signalling success
    pub const TASK_COMPLETED: &str = "completed";

    pub const TASK_QUEUED: &str = "queued";
    pub const TASK_RUNNING: &str = "running";
    pub const TASK_FAILED: &str = "failed";
    pub const TASK_CANCELLED: &str = "cancelled";

    /// Reported when a task id is absent from the task list
    pub const TASK_NOT_FOUND: &str = "not-found";

    /// Resource status expected after a start
    pub const RUNNING: &str = "running";

    /// Resource status expected after a stop
    pub const STOPPED: &str = "stopped";
}

/// Polling defaults
pub mod poll {
    use super::Duration;

    /// Fixed delay between two task list polls
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Shortest accepted delay between polls
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// Deadline applied to one poll loop unless configured otherwise
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
}

/// Default HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the per-user configuration directory path
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(CSTATION_DIR_NAME)
}

/// Build the per-user configuration file path
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the local configuration file path in the current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(CSTATION_DIR_NAME).join(CONFIG_FILE_NAME)
}
