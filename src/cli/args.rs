//! Command line argument parsing
//!
//! Subcommands map onto the station's resource families:
//! - `overview`, `tasks`: read-only views of the station
//! - `container`, `app`, `volume`: list, inspect and reconcile resources
//! - `show-config`, `init-config`: configuration discovery helpers

use crate::cli::config::ConfigOverrides;
use crate::env;
use crate::station::{
    AppSpec, ContainerRef, ContainerSpec, CreateMode, Operation, PortBinding, ResourceDescriptor,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ExecutionMode {
    Query(Query),
    Reconcile(ReconcileRequest),
    ShowConfig,
    InitConfig,
}

/// Read-only requests; nothing is submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Overview,
    Tasks { task_id: Option<String> },
    Containers,
    InspectContainer(ContainerRef),
    InspectApplication(String),
    Volumes,
    InspectVolume(String),
}

#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub descriptor: ResourceDescriptor,
    pub operation: Operation,
}

#[derive(Debug, Parser)]
#[command(name = "cstation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive Container Station operations to a verified result")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Default, clap::Args)]
pub struct GlobalOpts {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Container Station base URL
    #[arg(long = "host", env = env::HOST_ENV_VAR, global = true)]
    pub host: Option<String>,
    /// Session cookie (`NAME=VALUE`)
    #[arg(long = "token", env = env::TOKEN_ENV_VAR, hide_env_values = true, global = true)]
    pub token: Option<String>,
    /// Delay between task polls in milliseconds
    #[arg(long = "poll-interval-ms", value_name = "MS", global = true)]
    pub poll_interval_ms: Option<u64>,
    /// Give up waiting on a task after this many seconds (0 waits forever)
    #[arg(long = "timeout-secs", value_name = "SECS", global = true)]
    pub timeout_secs: Option<u64>,
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

impl GlobalOpts {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host_url: self.host.clone(),
            token: self.token.clone(),
            poll_interval_ms: self.poll_interval_ms,
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show apps and containers with their status
    Overview,
    /// Show the station task list, or one task's state
    Tasks {
        /// Only report this task
        #[arg(long = "id")]
        task_id: Option<String>,
    },
    /// Container operations
    #[command(subcommand)]
    Container(ContainerCommand),
    /// Compose application operations
    #[command(subcommand)]
    App(AppCommand),
    /// Volume operations
    #[command(subcommand)]
    Volume(VolumeCommand),
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default user configuration file
    InitConfig,
}

#[derive(Debug, Subcommand)]
pub enum ContainerCommand {
    /// List all containers
    List,
    /// Show one container
    Inspect {
        id: String,
        /// Container runtime type
        #[arg(long = "type", default_value = "docker")]
        ctype: String,
    },
    /// Create a container and wait until it shows up
    Create {
        /// Container name
        #[arg(required_unless_present = "file")]
        name: Option<String>,
        /// Image reference
        #[arg(required_unless_present = "file")]
        image: Option<String>,
        /// JSON container spec; replaces name and image, other flags apply on top
        #[arg(short = 'f', long = "file", conflicts_with_all = ["name", "image"])]
        file: Option<PathBuf>,
        /// Container runtime type [default: docker]
        #[arg(long = "type")]
        ctype: Option<String>,
        /// Environment variable (`KEY=VALUE`), repeatable
        #[arg(short = 'e', long = "env", value_parser = parse_key_val)]
        env: Vec<(String, String)>,
        /// Port binding (`HOST:CONTAINER[/PROTOCOL]`), repeatable
        #[arg(short = 'p', long = "publish", value_parser = parse_port)]
        publish: Vec<PortBinding>,
        /// Do not pull the image before creating
        #[arg(long = "no-pull")]
        no_pull: bool,
        /// Replace a container with the same name
        #[arg(long = "recreate")]
        recreate: bool,
    },
    /// Start a container and verify it is running
    Start {
        id: String,
        #[arg(long = "type", default_value = "docker")]
        ctype: String,
    },
    /// Stop a container and verify it is stopped
    Stop {
        id: String,
        #[arg(long = "type", default_value = "docker")]
        ctype: String,
    },
    /// Delete a container
    Delete {
        id: String,
        #[arg(long = "type", default_value = "docker")]
        ctype: String,
        /// Also remove attached volumes
        #[arg(long = "remove-volumes")]
        remove_volumes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum AppCommand {
    /// Show one application
    Inspect { name: String },
    /// Create an application from a compose file
    Create {
        name: String,
        /// docker-compose file
        #[arg(short = 'f', long = "compose", value_name = "FILE")]
        compose: PathBuf,
        /// Replace an application with the same name
        #[arg(long = "recreate")]
        recreate: bool,
    },
    /// Start an application and verify it is running
    Start { name: String },
    /// Stop an application and verify it is stopped
    Stop { name: String },
    /// Delete an application
    Delete {
        name: String,
        /// Also remove attached volumes
        #[arg(long = "remove-volumes")]
        remove_volumes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum VolumeCommand {
    /// List all volumes
    List,
    /// Show one volume
    Inspect { name: String },
    /// Create a volume
    Create { name: String },
    /// Delete a volume
    Delete { name: String },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Overview) => Ok(ExecutionMode::Query(Query::Overview)),
            Some(Commands::Tasks { task_id }) => Ok(ExecutionMode::Query(Query::Tasks {
                task_id: task_id.clone(),
            })),
            Some(Commands::Container(command)) => Self::container_mode(command),
            Some(Commands::App(command)) => Self::app_mode(command),
            Some(Commands::Volume(command)) => Ok(Self::volume_mode(command)),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'cstation --help' to see available commands."
                    .to_string(),
            ),
        }
    }

    fn container_mode(command: &ContainerCommand) -> Result<ExecutionMode, String> {
        let (descriptor, operation) = match command {
            ContainerCommand::List => return Ok(ExecutionMode::Query(Query::Containers)),
            ContainerCommand::Inspect { id, ctype } => {
                return Ok(ExecutionMode::Query(Query::InspectContainer(
                    ContainerRef::new(id, ctype),
                )));
            }
            ContainerCommand::Create {
                name,
                image,
                file,
                ctype,
                env,
                publish,
                no_pull,
                recreate,
            } => {
                let mut spec = match (file, name, image) {
                    (Some(path), _, _) => Self::load_container_spec(path)?,
                    (None, Some(name), Some(image)) => ContainerSpec::new(name, image),
                    _ => return Err("container create needs NAME and IMAGE or --file".to_string()),
                };
                if let Some(ctype) = ctype {
                    spec.ctype = ctype.clone();
                }
                spec.env.extend(env.iter().cloned());
                spec.portbindings.extend(publish.iter().cloned());
                if *no_pull {
                    spec.pull = false;
                }
                if *recreate {
                    spec.operation = CreateMode::Recreate;
                }
                let operation = Operation::from(spec.operation);
                (ResourceDescriptor::NewContainer(spec), operation)
            }
            ContainerCommand::Start { id, ctype } => (
                ResourceDescriptor::Container(ContainerRef::new(id, ctype)),
                Operation::Start,
            ),
            ContainerCommand::Stop { id, ctype } => (
                ResourceDescriptor::Container(ContainerRef::new(id, ctype)),
                Operation::Stop,
            ),
            ContainerCommand::Delete {
                id,
                ctype,
                remove_volumes,
            } => (
                ResourceDescriptor::Container(ContainerRef::new(id, ctype)),
                Operation::Delete {
                    remove_volumes: *remove_volumes,
                },
            ),
        };

        Ok(ExecutionMode::Reconcile(ReconcileRequest {
            descriptor,
            operation,
        }))
    }

    fn app_mode(command: &AppCommand) -> Result<ExecutionMode, String> {
        let (descriptor, operation) = match command {
            AppCommand::Inspect { name } => {
                return Ok(ExecutionMode::Query(Query::InspectApplication(name.clone())));
            }
            AppCommand::Create {
                name,
                compose,
                recreate,
            } => {
                let yml = fs::read_to_string(compose)
                    .map_err(|e| format!("Failed to read compose file {:?}: {}", compose, e))?;
                let mut spec = AppSpec::new(name, yml);
                let operation = if *recreate {
                    spec.operation = CreateMode::Recreate;
                    Operation::Recreate
                } else {
                    Operation::Create
                };
                (ResourceDescriptor::NewApplication(spec), operation)
            }
            AppCommand::Start { name } => {
                (ResourceDescriptor::Application(name.clone()), Operation::Start)
            }
            AppCommand::Stop { name } => {
                (ResourceDescriptor::Application(name.clone()), Operation::Stop)
            }
            AppCommand::Delete {
                name,
                remove_volumes,
            } => (
                ResourceDescriptor::Application(name.clone()),
                Operation::Delete {
                    remove_volumes: *remove_volumes,
                },
            ),
        };

        Ok(ExecutionMode::Reconcile(ReconcileRequest {
            descriptor,
            operation,
        }))
    }

    fn volume_mode(command: &VolumeCommand) -> ExecutionMode {
        let (name, operation) = match command {
            VolumeCommand::List => return ExecutionMode::Query(Query::Volumes),
            VolumeCommand::Inspect { name } => {
                return ExecutionMode::Query(Query::InspectVolume(name.clone()));
            }
            VolumeCommand::Create { name } => (name, Operation::Create),
            VolumeCommand::Delete { name } => (
                name,
                Operation::Delete {
                    remove_volumes: false,
                },
            ),
        };

        ExecutionMode::Reconcile(ReconcileRequest {
            descriptor: ResourceDescriptor::Volume(name.clone()),
            operation,
        })
    }

    fn load_container_spec(path: &Path) -> Result<ContainerSpec, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read container spec {:?}: {}", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Invalid container spec {:?}: {}", path, e))
    }
}

/// Parse `KEY=VALUE`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse `HOST:CONTAINER[/PROTOCOL]`; protocol defaults to tcp.
fn parse_port(s: &str) -> Result<PortBinding, String> {
    let (ports, protocol) = s.split_once('/').unwrap_or((s, "tcp"));
    let (host, container) = ports
        .split_once(':')
        .ok_or_else(|| format!("expected HOST:CONTAINER, got '{}'", s))?;
    let port = |p: &str| {
        p.parse::<u16>()
            .map(i32::from)
            .map_err(|_| format!("invalid port '{}' in '{}'", p, s))
    };
    Ok(PortBinding {
        host: port(host)?,
        container: port(container)?,
        protocol: protocol.to_string(),
        ..Default::default()
    })
}
