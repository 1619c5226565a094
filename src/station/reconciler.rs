//! Operation-to-completion reconciliation for containers and applications.
//!
//! Every mutation runs the same sequence:
//!
//! 1. creates check the inventory for a same-name resource
//! 2. the mutation is submitted and its task id decoded
//! 3. the task is polled until it completes
//! 4. a fresh inventory is fetched and the post-condition verified
//!
//! Deletes stop after step 3: a completed task is proof enough.

use crate::station::client::{Mutation, StationApi, decode};
use crate::station::inventory::{Inventory, InventoryEntry};
use crate::station::models::{
    AppInfo, AppSpec, AppsRequest, ContainerInfo, ContainerItemsData, ContainerItemsRequest,
    ContainerRef, ContainerSpec, ContainerSummary, CreateMode, ResourceKind, TaskItem,
    TaskReceipt, VolumeInfo,
};
use crate::station::tracker::{PollPolicy, TaskState, TaskTracker};
use crate::station::volume::VolumeReconciler;
use crate::station::{Result, StationError};
use crate::env;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Operation requested on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    /// Create, replacing a resource of the same name
    Recreate,
    Start,
    Stop,
    Delete {
        /// Also remove the volumes attached to the container or application
        remove_volumes: bool,
    },
}

impl Operation {
    /// Parse the station's operation names.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::UnsupportedOperation`] for any other string.
    pub fn parse(kind: ResourceKind, value: &str) -> Result<Self> {
        match value {
            "create" => Ok(Operation::Create),
            "recreate" => Ok(Operation::Recreate),
            "start" => Ok(Operation::Start),
            "stop" => Ok(Operation::Stop),
            "delete" => Ok(Operation::Delete {
                remove_volumes: false,
            }),
            other => Err(StationError::UnsupportedOperation {
                kind,
                operation: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Recreate => "recreate",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Delete { .. } => "delete",
        }
    }

    fn unsupported_for(self, kind: ResourceKind) -> StationError {
        StationError::UnsupportedOperation {
            kind,
            operation: self.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CreateMode> for Operation {
    fn from(mode: CreateMode) -> Self {
        match mode {
            CreateMode::Create => Operation::Create,
            CreateMode::Recreate => Operation::Recreate,
        }
    }
}

/// Resource a reconciliation acts on.
///
/// Creates carry the full spec; existing containers are addressed by id and
/// type, applications and volumes by name.
#[derive(Debug, Clone)]
pub enum ResourceDescriptor {
    NewContainer(ContainerSpec),
    Container(ContainerRef),
    NewApplication(AppSpec),
    Application(String),
    Volume(String),
}

impl ResourceDescriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDescriptor::NewContainer(_) | ResourceDescriptor::Container(_) => {
                ResourceKind::Container
            }
            ResourceDescriptor::NewApplication(_) | ResourceDescriptor::Application(_) => {
                ResourceKind::Application
            }
            ResourceDescriptor::Volume(_) => ResourceKind::Volume,
        }
    }
}

/// Detail returned by creates.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceDetail {
    Container(ContainerInfo),
    Application(AppInfo),
    Volume(VolumeInfo),
}

/// A verified reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub kind: ResourceKind,
    pub operation: Operation,
    /// Present for creates
    pub resource: Option<ResourceDetail>,
}

/// Printable outcome of one reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub success: bool,
    pub kind: ResourceKind,
    pub operation: String,
    pub resource: Option<ResourceDetail>,
    pub failure_reason: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn from_result(
        kind: ResourceKind,
        operation: Operation,
        result: Result<Reconciled>,
    ) -> Self {
        let (success, resource, failure_reason) = match result {
            Ok(reconciled) => (true, reconciled.resource, None),
            Err(e) => (false, None, Some(e.to_string())),
        };
        Self {
            success,
            kind,
            operation: operation.to_string(),
            resource,
            failure_reason,
            finished_at: Utc::now(),
        }
    }
}

/// State transitions verified against the inventory afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Start,
    Stop,
}

impl Transition {
    fn expected_status(self) -> &'static str {
        match self {
            Transition::Start => env::status::RUNNING,
            Transition::Stop => env::status::STOPPED,
        }
    }

    fn endpoint(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Transition(Transition),
    Delete { remove_volumes: bool },
}

impl Change {
    fn operation(self) -> Operation {
        match self {
            Change::Transition(Transition::Start) => Operation::Start,
            Change::Transition(Transition::Stop) => Operation::Stop,
            Change::Delete { remove_volumes } => Operation::Delete { remove_volumes },
        }
    }
}

/// Existing resource whose state is being changed.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Container(&'a ContainerRef),
    Application(&'a str),
}

impl Target<'_> {
    fn kind(&self) -> ResourceKind {
        match self {
            Target::Container(_) => ResourceKind::Container,
            Target::Application(_) => ResourceKind::Application,
        }
    }

    fn identity(&self) -> String {
        match self {
            Target::Container(container) => container.id.clone(),
            Target::Application(name) => name.to_string(),
        }
    }

    fn locate<'i>(&self, inventory: &'i Inventory) -> Option<&'i InventoryEntry> {
        match self {
            Target::Container(container) => inventory.container_by_id(&container.id),
            Target::Application(name) => inventory.app(name),
        }
    }

    fn mutation(&self, change: Change) -> Result<Mutation> {
        let (method, endpoint, remove_volumes) = match (self, change) {
            (Target::Container(_), Change::Transition(t)) => (
                Method::PUT,
                format!("{}/{}", env::api::CONTAINERS, t.endpoint()),
                None,
            ),
            (Target::Container(_), Change::Delete { remove_volumes }) => (
                Method::DELETE,
                env::api::CONTAINERS.to_string(),
                Some(remove_volumes),
            ),
            (Target::Application(_), Change::Transition(t)) => (
                Method::PUT,
                format!("{}/{}", env::api::APPS, t.endpoint()),
                None,
            ),
            (Target::Application(_), Change::Delete { remove_volumes }) => (
                Method::DELETE,
                env::api::APPS.to_string(),
                Some(remove_volumes),
            ),
        };

        let body = match self {
            Target::Container(container) => serde_json::to_value(ContainerItemsRequest {
                data: ContainerItemsData {
                    items: vec![(*container).clone()],
                    remove_volumes,
                },
            }),
            Target::Application(name) => serde_json::to_value(AppsRequest {
                apps: vec![name.to_string()],
                remove_volume: remove_volumes,
            }),
        }
        .map_err(|e| StationError::encode(format!("{} {} request", self.kind(), change.operation()), e))?;

        Ok(Mutation::new(method, endpoint, body))
    }
}

/// Decode the task id from a mutation reply.
pub(crate) fn task_id_from(body: &[u8]) -> Result<String> {
    let receipt: TaskReceipt = decode(body, "task receipt")?;
    if receipt.data.task_id.trim().is_empty() {
        return Err(StationError::decode(
            "task receipt",
            serde::de::Error::custom("empty taskID"),
        ));
    }
    Ok(receipt.data.task_id)
}

/// Drives container and application operations to a verified result.
///
/// Cheap to clone; clones share the transport and the cancellation token.
#[derive(Clone)]
pub struct Reconciler {
    api: Arc<dyn StationApi>,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(api: Arc<dyn StationApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort poll loops when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Volume operations sharing this reconciler's transport and policy.
    pub fn volumes(&self) -> VolumeReconciler {
        VolumeReconciler::new(self.api.clone(), self.policy).with_cancellation(self.cancel.clone())
    }

    /// Fresh inventory snapshot.
    pub async fn snapshot(&self) -> Result<Inventory> {
        Inventory::fetch(self.api.as_ref()).await
    }

    /// The station task list as reported.
    pub async fn tasks(&self) -> Result<Vec<TaskItem>> {
        Ok(self.api.tasks().await?.data.items)
    }

    /// Current state of one task.
    pub async fn task_state(&self, task_id: &str) -> Result<TaskState> {
        TaskTracker::new(self.api.as_ref()).state(task_id).await
    }

    /// Run `operation` on `descriptor` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::UnsupportedOperation`] when the descriptor has
    /// no endpoint for the operation (starting a container spec that was
    /// never created, recreating a volume, ...), otherwise whatever the
    /// typed entry point returns.
    pub async fn reconcile(
        &self,
        descriptor: ResourceDescriptor,
        operation: Operation,
    ) -> Result<Reconciled> {
        let kind = descriptor.kind();
        let resource = match (descriptor, operation) {
            (ResourceDescriptor::NewContainer(mut spec), Operation::Create | Operation::Recreate) => {
                spec.operation = create_mode(operation);
                Some(ResourceDetail::Container(self.create_container(spec).await?))
            }
            (ResourceDescriptor::Container(container), Operation::Start) => {
                self.start_container(&container).await?;
                None
            }
            (ResourceDescriptor::Container(container), Operation::Stop) => {
                self.stop_container(&container).await?;
                None
            }
            (ResourceDescriptor::Container(container), Operation::Delete { remove_volumes }) => {
                self.delete_container(&container, remove_volumes).await?;
                None
            }
            (ResourceDescriptor::NewApplication(mut spec), Operation::Create | Operation::Recreate) => {
                spec.operation = create_mode(operation);
                Some(ResourceDetail::Application(self.create_application(spec).await?))
            }
            (ResourceDescriptor::Application(name), Operation::Start) => {
                self.start_application(&name).await?;
                None
            }
            (ResourceDescriptor::Application(name), Operation::Stop) => {
                self.stop_application(&name).await?;
                None
            }
            (ResourceDescriptor::Application(name), Operation::Delete { remove_volumes }) => {
                self.delete_application(&name, remove_volumes).await?;
                None
            }
            (ResourceDescriptor::Volume(name), Operation::Create) => {
                Some(ResourceDetail::Volume(self.volumes().create(&name).await?))
            }
            (ResourceDescriptor::Volume(name), Operation::Delete { .. }) => {
                self.volumes().delete(&name).await?;
                None
            }
            (_, operation) => return Err(operation.unsupported_for(kind)),
        };

        Ok(Reconciled {
            kind,
            operation,
            resource,
        })
    }

    /// Create a container and return its inspection data, stamped with the
    /// status the overview reports for it.
    ///
    /// # Errors
    ///
    /// - [`StationError::AlreadyExists`] if a container of that name exists
    ///   and `spec.operation` is not recreate; nothing is submitted
    /// - [`StationError::NotFoundAfterCreate`] if the task completed but the
    ///   container is missing from the overview
    pub async fn create_container(&self, spec: ContainerSpec) -> Result<ContainerInfo> {
        let span = reconcile_span(ResourceKind::Container, spec.operation.into());
        async move {
            let name = spec.name.clone();
            self.ensure_absent(ResourceKind::Container, &name, spec.operation)
                .await?;

            let body = serde_json::to_value(&spec)
                .map_err(|e| StationError::encode("container spec", e))?;
            let task_id = self
                .submit(Mutation::new(Method::POST, env::api::CONTAINERS, body))
                .await?;
            self.wait(&task_id).await?;

            let inventory = self.snapshot().await?;
            let Some(entry) = inventory.container_by_name(&name) else {
                warn!(resource = %name, "Container missing from overview after creation");
                return Err(StationError::NotFoundAfterCreate {
                    kind: ResourceKind::Container,
                    name,
                });
            };

            let container = ContainerRef::new(entry.id.clone(), entry.ctype.clone());
            let mut info = self.api.inspect_container(&container).await?;
            info.data.status = entry.status.clone();
            info!(resource = %name, id = %container.id, status = %info.data.status, "Container created");
            Ok(info)
        }
        .instrument(span)
        .await
    }

    pub async fn start_container(&self, container: &ContainerRef) -> Result<()> {
        self.change(Target::Container(container), Change::Transition(Transition::Start))
            .await
    }

    pub async fn stop_container(&self, container: &ContainerRef) -> Result<()> {
        self.change(Target::Container(container), Change::Transition(Transition::Stop))
            .await
    }

    pub async fn delete_container(&self, container: &ContainerRef, remove_volumes: bool) -> Result<()> {
        self.change(Target::Container(container), Change::Delete { remove_volumes })
            .await
    }

    /// Inspection data for one container, as the station reports it.
    pub async fn inspect_container(&self, container: &ContainerRef) -> Result<ContainerInfo> {
        self.api.inspect_container(container).await
    }

    /// All containers, including the ones not managed by an application.
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        Ok(self.api.containers().await?.data.items)
    }

    /// Create a compose application and return its inspection data, stamped
    /// with the status the overview reports for it.
    ///
    /// # Errors
    ///
    /// Same contract as [`Reconciler::create_container`].
    pub async fn create_application(&self, spec: AppSpec) -> Result<AppInfo> {
        let span = reconcile_span(ResourceKind::Application, spec.operation.into());
        async move {
            let name = spec.name.clone();
            self.ensure_absent(ResourceKind::Application, &name, spec.operation)
                .await?;

            let body = serde_json::to_value(&spec)
                .map_err(|e| StationError::encode("application spec", e))?;
            let task_id = self
                .submit(Mutation::new(Method::POST, env::api::APPS_COMPOSE, body))
                .await?;
            self.wait(&task_id).await?;

            let inventory = self.snapshot().await?;
            let Some(entry) = inventory.app(&name) else {
                warn!(resource = %name, "Application missing from overview after creation");
                return Err(StationError::NotFoundAfterCreate {
                    kind: ResourceKind::Application,
                    name,
                });
            };

            let mut info = self.api.inspect_application(&name).await?;
            info.data.status = entry.status.clone();
            info!(resource = %name, status = %info.data.status, "Application created");
            Ok(info)
        }
        .instrument(span)
        .await
    }

    pub async fn start_application(&self, name: &str) -> Result<()> {
        self.change(Target::Application(name), Change::Transition(Transition::Start))
            .await
    }

    pub async fn stop_application(&self, name: &str) -> Result<()> {
        self.change(Target::Application(name), Change::Transition(Transition::Stop))
            .await
    }

    pub async fn delete_application(&self, name: &str, remove_volumes: bool) -> Result<()> {
        self.change(Target::Application(name), Change::Delete { remove_volumes })
            .await
    }

    /// Inspection data for one application.
    ///
    /// The inspect endpoint carries no status, so it is filled in from a
    /// fresh overview; it stays empty if the overview does not list the app.
    pub async fn inspect_application(&self, name: &str) -> Result<AppInfo> {
        let mut info = self.api.inspect_application(name).await?;
        if let Some(entry) = self.snapshot().await?.app(name) {
            info.data.status = entry.status.clone();
        }
        Ok(info)
    }

    async fn change(&self, target: Target<'_>, change: Change) -> Result<()> {
        let span = reconcile_span(target.kind(), change.operation());
        async move {
            let task_id = self.submit(target.mutation(change)?).await?;
            self.wait(&task_id).await?;

            let transition = match change {
                Change::Delete { .. } => {
                    info!(identity = %target.identity(), "Deleted {}", target.kind());
                    return Ok(());
                }
                Change::Transition(transition) => transition,
            };

            let inventory = self.snapshot().await?;
            let expected = transition.expected_status();
            match target.locate(&inventory) {
                Some(entry) if entry.status == expected => {
                    info!(identity = %target.identity(), status = expected, "Reached expected status");
                    Ok(())
                }
                found => {
                    let observed = found.map(|entry| entry.status.clone());
                    warn!(identity = %target.identity(), expected, ?observed, "Post-condition not met");
                    Err(StationError::OperationIncomplete {
                        kind: target.kind(),
                        operation: change.operation().to_string(),
                        identity: target.identity(),
                        observed,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Fail with `AlreadyExists` unless recreating.
    async fn ensure_absent(&self, kind: ResourceKind, name: &str, mode: CreateMode) -> Result<()> {
        let inventory = self.snapshot().await?;
        if inventory.find_by_name(kind, name).is_some() && mode != CreateMode::Recreate {
            warn!(resource = name, "Refusing to create: name already taken");
            return Err(StationError::AlreadyExists {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn submit(&self, mutation: Mutation) -> Result<String> {
        debug!(method = %mutation.method, endpoint = %mutation.endpoint, "Submitting mutation");
        let body = self.api.submit(mutation).await?;
        let task_id = task_id_from(&body)?;
        info!(task_id = %task_id, "Mutation accepted");
        Ok(task_id)
    }

    async fn wait(&self, task_id: &str) -> Result<()> {
        TaskTracker::new(self.api.as_ref())
            .wait_for_completion(task_id, &self.policy, &self.cancel)
            .await
    }
}

fn create_mode(operation: Operation) -> CreateMode {
    if operation == Operation::Recreate {
        CreateMode::Recreate
    } else {
        CreateMode::Create
    }
}

pub(crate) fn reconcile_span(kind: ResourceKind, operation: Operation) -> tracing::Span {
    info_span!(
        "reconcile",
        id = %uuid::Uuid::new_v4(),
        kind = %kind,
        op = %operation
    )
}
