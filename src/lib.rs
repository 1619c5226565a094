//! # cstation
//!
//! Client for the Container Station API that drives container, application
//! and volume operations to a verified result.
//!
//! The station acknowledges every mutation with a task id long before the
//! work is done. This crate polls that task to completion and then checks a
//! fresh inventory snapshot, so a successful call means the resource really
//! reached the requested state.
//!
//! ## Architecture Overview
//!
//! - **[`station`]**: transport seam, wire models, inventory snapshots, task
//!   tracking and the reconcilers
//! - **[`auth`]**: the session credential carried on every request
//! - **[`cli`]**: argument parsing and configuration discovery for the binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cstation::{Credential, Operation, Reconciler, ResourceDescriptor, StationClient};
//! use cstation::station::PollPolicy;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StationClient::builder("http://nas.local:8080")
//!         .credential(Credential::from_cookie("NAS_SID=abc123"))
//!         .build()?;
//!     let reconciler = Reconciler::new(Arc::new(client), PollPolicy::default());
//!
//!     reconciler
//!         .reconcile(ResourceDescriptor::Application("blog".into()), Operation::Stop)
//!         .await?;
//!     Ok(())
//! }
//! ```

/// Container Station reconciliation layer.
pub mod station;

/// Session credential handling.
pub mod auth;

/// Environment constants and path utilities.
///
/// Centralizes API paths, protocol sentinels and configuration file names.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use auth::Credential;
pub use station::{
    Inventory, Operation, Reconciled, ReconciliationReport, Reconciler, ResourceDescriptor,
    StationApi, StationClient, StationError, TaskTracker, VolumeReconciler,
};
