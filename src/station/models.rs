//! Wire types for the Container Station v3 API.
//!
//! Request bodies mirror the JSON the station accepts; response types are
//! lenient (`#[serde(default)]`, `null` collections read as empty) because the
//! station omits fields freely between firmware versions.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Read `null` as the type's default value.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Kind of resource a reconciliation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Application,
    Volume,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Container => write!(f, "container"),
            ResourceKind::Application => write!(f, "application"),
            ResourceKind::Volume => write!(f, "volume"),
        }
    }
}

/// Create mode carried in the `operation` field of create bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateMode {
    #[default]
    Create,
    /// Replace an existing resource of the same name
    Recreate,
}

/// Container addressed by id and runtime type (`docker`, `lxd`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRef {
    #[serde(rename = "cid")]
    pub id: String,
    pub ctype: String,
}

impl ContainerRef {
    pub fn new(id: impl Into<String>, ctype: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ctype: ctype.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ctype, self.id)
    }
}

// ---------------------------------------------------------------------------
// Tasks and overview
// ---------------------------------------------------------------------------

/// Reply to every task-producing mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskReceipt {
    pub data: TaskReceiptData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskReceiptData {
    #[serde(rename = "taskID")]
    pub task_id: String,
}

/// `GET tasks`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskList {
    pub data: TaskListData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskListData {
    #[serde(deserialize_with = "nullable")]
    pub items: Vec<TaskItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskItem {
    pub id: String,
    pub category: String,
    pub cancelable: bool,
    pub description: String,
    pub progress: i32,
    pub detail: String,
    pub state: String,
}

/// `GET overview`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Overview {
    pub data: OverviewData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverviewData {
    #[serde(deserialize_with = "nullable")]
    pub app: Vec<OverviewApp>,
    #[serde(deserialize_with = "nullable")]
    pub container: Vec<OverviewContainer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverviewApp {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverviewContainer {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ctype: String,
    pub status: String,
    pub cpu: f64,
    pub memory: f64,
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// Body of `POST containers`.
///
/// Fields missing from a deserialized document take the values of
/// [`ContainerSpec::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", default)]
pub struct ContainerSpec {
    #[serde(rename = "type")]
    pub ctype: String,
    pub name: String,
    pub image: String,
    pub autoremove: bool,
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub tty: bool,
    pub openstdin: bool,
    pub pull: bool,
    pub network: String,
    pub networktype: String,
    pub hostname: String,
    pub dns: Vec<String>,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub runtime: String,
    pub privileged: bool,
    pub operation: CreateMode,
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
    pub devices: Vec<Device>,
    pub volumes: Vec<VolumeMount>,
    pub portbindings: Vec<PortBinding>,
    pub cpupin: CpuPin,
    pub restartpolicy: RestartPolicy,
}

impl ContainerSpec {
    /// Minimal docker container spec for `image` named `name`.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            ctype: "docker".to_string(),
            name: name.into(),
            image: image.into(),
            autoremove: false,
            cmd: Vec::new(),
            entrypoint: Vec::new(),
            tty: false,
            openstdin: false,
            pull: true,
            network: String::new(),
            networktype: String::new(),
            hostname: String::new(),
            dns: Vec::new(),
            env: HashMap::new(),
            labels: HashMap::new(),
            runtime: String::new(),
            privileged: false,
            operation: CreateMode::Create,
            ip_address: String::new(),
            devices: Vec::new(),
            volumes: Vec::new(),
            portbindings: Vec::new(),
            cpupin: CpuPin::default(),
            restartpolicy: RestartPolicy::default(),
        }
    }
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub name: String,
    pub maximumretrycount: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuPin {
    pub cpuids: String,
    #[serde(rename = "type")]
    pub pin_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortBinding {
    pub host: i32,
    pub container: i32,
    pub protocol: String,
    pub hostip: String,
    pub containerip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeMount {
    #[serde(rename = "type")]
    pub mount_type: String,
    pub name: String,
    pub container: String,
    pub source: String,
    pub destination: String,
    pub permission: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub name: String,
    pub permission: String,
}

/// Item of `GET containers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ctype: String,
    pub image: String,
    #[serde(rename = "imageid")]
    pub image_id: String,
    pub status: String,
    pub project: String,
    pub runtime: String,
    #[serde(rename = "memorylimit")]
    pub mem_limit: i64,
    #[serde(rename = "cpulimit")]
    pub cpu_limit: i64,
    pub uuid: String,
    pub privileged: bool,
    pub cpu: f64,
    pub memory: f64,
    pub created: String,
    #[serde(rename = "startedat")]
    pub started_at: String,
    #[serde(deserialize_with = "nullable")]
    pub cmd: Vec<String>,
    #[serde(rename = "portbindings", deserialize_with = "nullable")]
    pub port_bindings: Vec<PortBinding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerList {
    pub data: ContainerListData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerListData {
    #[serde(deserialize_with = "nullable")]
    pub items: Vec<ContainerSummary>,
}

/// `GET containers/{type}?id={id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerInfo {
    pub data: ContainerDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerDetail {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ctype: String,
    pub image: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub status: String,
    pub cpu_limit: i64,
    pub mem_limit: i64,
    pub mem_reservation: i64,
    pub cpupin: CpuPin,
    #[serde(deserialize_with = "nullable")]
    pub networks: Vec<ContainerNetwork>,
    pub project: String,
    pub uuid: String,
    pub runtime: String,
    pub created: String,
    pub started_at: String,
    pub finished_at: String,
    #[serde(deserialize_with = "nullable")]
    pub cmd: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub dns: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub exposed_ports: Vec<String>,
    pub pid: i64,
    #[serde(deserialize_with = "nullable")]
    pub port_bindings: Vec<InspectPortBinding>,
    #[serde(deserialize_with = "nullable")]
    pub devices: Vec<Device>,
    pub restart_policy: InspectRestartPolicy,
    #[serde(deserialize_with = "nullable")]
    pub entrypoint: Vec<String>,
    pub privileged: bool,
    #[serde(deserialize_with = "nullable")]
    pub env: HashMap<String, String>,
    #[serde(deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
    #[serde(deserialize_with = "nullable")]
    pub volumes: Vec<VolumeMount>,
    pub auto_remove: bool,
    pub hostname: String,
    pub cpu: f64,
    pub memory: f64,
    pub tx: f64,
    pub rx: f64,
    pub read: f64,
    pub write: f64,
    pub tty: bool,
    pub open_stdin: bool,
    pub docker_status: DockerStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerNetwork {
    pub id: String,
    pub name: String,
    pub ip_address: String,
    pub display_name: String,
    pub mac_address: String,
    pub gateway: String,
    pub network_type: String,
    #[serde(rename = "isStaticIP")]
    pub is_static_ip: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectPortBinding {
    pub host: i32,
    pub container: i32,
    pub protocol: String,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    #[serde(rename = "containerIP")]
    pub container_ip: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InspectRestartPolicy {
    pub name: String,
    pub maximum_retry_count: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DockerStatus {
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
    pub dead: bool,
    pub exit_code: i32,
    pub started_at: String,
    pub finished_at: String,
    pub health: String,
}

/// Body of `PUT containers/{start|stop}` and `DELETE containers`.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerItemsRequest {
    pub data: ContainerItemsData,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerItemsData {
    pub items: Vec<ContainerRef>,
    #[serde(rename = "removeVolumes", skip_serializing_if = "Option::is_none")]
    pub remove_volumes: Option<bool>,
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

/// Body of `POST apps/compose`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSpec {
    pub last_updated: String,
    pub name: String,
    /// docker-compose document
    pub yml: String,
    pub default_url: AppDefaultUrl,
    pub cpu_limit: i32,
    pub mem_limit: i32,
    pub mem_reservation: i32,
    pub operation: CreateMode,
}

impl AppSpec {
    pub fn new(name: impl Into<String>, yml: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            yml: yml.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppDefaultUrl {
    pub port: i32,
    pub service: String,
}

/// `GET apps/{name}/inspect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub data: AppDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppDetail {
    pub yml: String,
    pub cpu_limit: i32,
    pub mem_limit: i32,
    pub mem_reservation: i32,
    #[serde(rename = "defaultURL")]
    pub default_url: AppUrl,
    #[serde(deserialize_with = "nullable")]
    pub containers: Vec<AppContainer>,
    /// Taken from the overview, the inspect endpoint does not report it
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppUrl {
    pub port: i32,
    pub web_port: i32,
    pub url: String,
    pub container: String,
    pub protocol: String,
    pub service: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppContainer {
    pub id: String,
    pub name: String,
}

/// Body of `PUT apps/{start|stop}` and `DELETE apps`.
#[derive(Debug, Clone, Serialize)]
pub struct AppsRequest {
    pub apps: Vec<String>,
    #[serde(rename = "removeVolume", skip_serializing_if = "Option::is_none")]
    pub remove_volume: Option<bool>,
}

// ---------------------------------------------------------------------------
// Volumes
// ---------------------------------------------------------------------------

/// Body of `POST volumes`.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeCreateRequest {
    pub name: String,
}

/// Body of `DELETE volumes`.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeRemoveRequest {
    pub data: VolumeRemoveData,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeRemoveData {
    pub items: Vec<VolumeName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeName {
    pub name: String,
}

/// Reply to `POST volumes`.
///
/// The station signals success with a `data` envelope and failure with a bare
/// `{code, message}` object, without a discriminant field.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeCreateReply {
    Accepted(serde_json::Value),
    Rejected { code: Option<i64>, message: String },
}

#[derive(Deserialize)]
struct AcceptedShape {
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RejectedShape {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

impl VolumeCreateReply {
    /// Decode in two passes: the positive `data` shape first, then the
    /// negative `{code, message}` shape.
    ///
    /// When neither matches, the error from the positive pass is returned.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<AcceptedShape>(body) {
            Ok(accepted) => Ok(Self::Accepted(accepted.data)),
            Err(positive_err) => match serde_json::from_slice::<RejectedShape>(body) {
                Ok(rejected) => Ok(Self::Rejected {
                    code: rejected.code,
                    message: rejected.message,
                }),
                Err(_) => Err(positive_err),
            },
        }
    }
}

/// `GET volumes`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeList {
    pub data: VolumeListData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeListData {
    #[serde(deserialize_with = "nullable")]
    pub items: Vec<VolumeSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeSummary {
    pub created: String,
    pub driver: String,
    pub mount_point: String,
    pub name: String,
    pub project: String,
    pub used: bool,
    pub size: i64,
}

/// `GET volumes/{name}/inspect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeInfo {
    pub data: VolumeInspectData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeInspectData {
    #[serde(rename = "volumeInfo")]
    pub volume_info: VolumeDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct VolumeDetail {
    pub created_at: String,
    pub driver: String,
    pub mountpoint: String,
    pub name: String,
    pub scope: String,
}
