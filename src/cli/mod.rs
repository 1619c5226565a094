//! CLI-specific functionality for the Container Station client
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, ExecutionMode, GlobalOpts, Query, ReconcileRequest};
pub use config::{ConfigDiscovery, ConfigOverrides, PollConfig, StationConfig};
