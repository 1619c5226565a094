//! Volume reconciliation.
//!
//! Volumes diverge from containers and applications: a create is answered
//! synchronously with either a `data` envelope or a `{code, message}`
//! rejection instead of a task id, and a delete is done once its task
//! completes because volumes never show up in the overview.

use crate::env;
use crate::station::client::{Mutation, StationApi};
use crate::station::models::{
    ResourceKind, VolumeCreateReply, VolumeCreateRequest, VolumeInfo, VolumeName,
    VolumeRemoveData, VolumeRemoveRequest, VolumeSummary,
};
use crate::station::reconciler::{Operation, reconcile_span, task_id_from};
use crate::station::tracker::{PollPolicy, TaskTracker};
use crate::station::{Result, StationError};
use reqwest::Method;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, warn};

/// Volume create/delete with the same precondition and polling rules as the
/// container flows.
#[derive(Clone)]
pub struct VolumeReconciler {
    api: Arc<dyn StationApi>,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl VolumeReconciler {
    pub fn new(api: Arc<dyn StationApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the delete poll loop when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// All volumes on the station.
    pub async fn list(&self) -> Result<Vec<VolumeSummary>> {
        Ok(self.api.volumes().await?.data.items)
    }

    /// Inspection data for one volume.
    pub async fn inspect(&self, name: &str) -> Result<VolumeInfo> {
        self.api.inspect_volume(name).await
    }

    /// Create a volume and return its inspection data.
    ///
    /// There is no recreate for volumes: any existing volume of the same name
    /// fails the call before anything is submitted.
    ///
    /// # Errors
    ///
    /// - [`StationError::AlreadyExists`] if the name is taken
    /// - [`StationError::RemoteRejected`] carrying the station's message when
    ///   the reply has the rejection shape
    pub async fn create(&self, name: &str) -> Result<VolumeInfo> {
        let span = reconcile_span(ResourceKind::Volume, Operation::Create);
        async move {
            if self.list().await?.iter().any(|volume| volume.name == name) {
                warn!(resource = name, "Refusing to create: volume name already taken");
                return Err(StationError::AlreadyExists {
                    kind: ResourceKind::Volume,
                    name: name.to_string(),
                });
            }

            let body = serde_json::to_value(VolumeCreateRequest {
                name: name.to_string(),
            })
            .map_err(|e| StationError::encode("volume create request", e))?;
            let reply = self
                .api
                .submit(Mutation::new(Method::POST, env::api::VOLUMES, body))
                .await?;

            match VolumeCreateReply::from_slice(&reply)
                .map_err(|e| StationError::decode("volume create reply", e))?
            {
                VolumeCreateReply::Accepted(_) => {
                    info!(resource = name, "Volume created");
                    self.inspect(name).await
                }
                VolumeCreateReply::Rejected { code, message } => {
                    warn!(resource = name, ?code, %message, "Volume create rejected");
                    Err(StationError::RemoteRejected { code, message })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Delete a volume; done once the removal task completes.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let span = reconcile_span(
            ResourceKind::Volume,
            Operation::Delete {
                remove_volumes: false,
            },
        );
        async move {
            let body = serde_json::to_value(VolumeRemoveRequest {
                data: VolumeRemoveData {
                    items: vec![VolumeName {
                        name: name.to_string(),
                    }],
                },
            })
            .map_err(|e| StationError::encode("volume remove request", e))?;
            let reply = self
                .api
                .submit(Mutation::new(Method::DELETE, env::api::VOLUMES, body))
                .await?;
            let task_id = task_id_from(&reply)?;

            TaskTracker::new(self.api.as_ref())
                .wait_for_completion(&task_id, &self.policy, &self.cancel)
                .await?;
            info!(resource = name, "Volume deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
