//! Container Station reconciliation layer.
//!
//! Mutations against the Container Station API return a task id right away;
//! the real outcome only shows up later in the task list and in the inventory
//! overview. This module drives each operation to a verified result.
//!
//! ## Architecture
//!
//! - [`client`]: [`StationApi`] transport seam and its reqwest implementation
//! - [`models`]: wire types for every endpoint family
//! - [`inventory`]: fresh overview snapshots of apps and containers
//! - [`tracker`]: task state lookup and the bounded poll loop
//! - [`reconciler`]: precondition, submit, poll, verify for containers and apps
//! - [`volume`]: the volume variant, which has no post-delete verification
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cstation::auth::Credential;
//! use cstation::station::{ContainerSpec, PollPolicy, Reconciler, StationClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StationClient::builder("http://nas.local:8080")
//!         .credential(Credential::from_cookie("NAS_SID=abc123"))
//!         .build()?;
//!     let reconciler = Reconciler::new(Arc::new(client), PollPolicy::default());
//!
//!     let spec = ContainerSpec::new("web1", "nginx");
//!     let info = reconciler.create_container(spec).await?;
//!     println!("{} is {}", info.data.name, info.data.status);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod inventory;
pub mod models;
pub mod reconciler;
pub mod tracker;
pub mod volume;

#[cfg(test)]
mod tests;

pub use client::{StationApi, StationClient, StationClientBuilder};
pub use inventory::{Inventory, InventoryEntry};
pub use models::*;
pub use reconciler::{
    Operation, Reconciled, ReconciliationReport, Reconciler, ResourceDescriptor, ResourceDetail,
};
pub use tracker::{PollPolicy, TaskState, TaskTracker};
pub use volume::VolumeReconciler;

use std::time::Duration;

/// Errors surfaced by the reconciliation layer.
///
/// Nothing here is retried locally; the caller decides what is fatal.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// Network failure before a status line was received
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote answered with a non-success status
    #[error("Transport error: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Request body could not be serialized
    #[error("Failed to encode {context}: {source}")]
    Encode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Create precondition violated
    #[error("Cannot create {kind} '{name}': a {kind} with the same name already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// No endpoint exists for this kind/operation pair
    #[error("{kind} operation '{operation}' not supported")]
    UnsupportedOperation {
        kind: ResourceKind,
        operation: String,
    },

    /// Task completed but the new resource is absent from the overview.
    ///
    /// Either the station needs more time or creation failed silently; the
    /// API offers no signal to tell the two apart.
    #[error(
        "{kind} '{name}' is not found after creation: the station may need more time or the creation failed silently"
    )]
    NotFoundAfterCreate { kind: ResourceKind, name: String },

    /// Start/stop post-condition not met
    #[error("{kind} operation {operation} on '{identity}' failed to complete (observed status: {})", .observed.as_deref().unwrap_or("not found"))]
    OperationIncomplete {
        kind: ResourceKind,
        operation: String,
        identity: String,
        observed: Option<String>,
    },

    /// Negative response to a volume create
    #[error("Remote rejected request: {message}")]
    RemoteRejected { code: Option<i64>, message: String },

    /// Task reached a terminal state other than completed
    #[error("Task {task_id} ended in state '{state}'")]
    TaskFailed { task_id: String, state: String },

    /// Poll deadline expired before the task completed
    #[error("Task {task_id} did not complete within {waited:?}")]
    Timeout { task_id: String, waited: Duration },

    /// Caller cancelled while waiting on a task
    #[error("Waiting on task {task_id} was cancelled")]
    Cancelled { task_id: String },

    /// Host URL could not be used as a base for API paths
    #[error("Invalid host URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Client construction or configuration problem
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StationError {
    /// Network failures and non-success statuses alike.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }

    pub(crate) fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn encode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            context: context.into(),
            source,
        }
    }
}

/// Result type for Container Station operations.
pub type Result<T> = std::result::Result<T, StationError>;
