//! Typed views of compose field shapes
//!
//! Service definitions are kept as raw YAML values so that they can be
//! merged generically. The translation rules deserialize the individual
//! field they handle into one of these types.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;

/// A leaf value that may be written as a string, a number or a boolean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    String(String),
}

impl Scalar {
    /// Interpret the scalar as an unsigned count
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Int(n) => u64::try_from(*n).ok(),
            Scalar::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

/// Render a YAML leaf as text. `None` for null; containers are rejected.
pub fn scalar_text(value: &Value) -> std::result::Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => {
            Err("expected a scalar value, found a list or mapping".to_string())
        }
    }
}

/// Flatten a mapping into ordered `(key, value)` text pairs
pub fn mapping_pairs(
    mapping: &Mapping,
) -> std::result::Result<Vec<(String, Option<String>)>, String> {
    mapping
        .iter()
        .map(|(key, value)| {
            let key = scalar_text(key)?.ok_or_else(|| "null mapping key".to_string())?;
            Ok((key, scalar_text(value)?))
        })
        .collect()
}

/// `extends` reference of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtendsConfig {
    /// Short syntax: name of a service in the same document
    Name(String),
    /// Long syntax
    Full {
        /// Service to extend
        service: String,
        /// File in which the service is defined
        #[serde(default)]
        file: Option<String>,
    },
}

impl ExtendsConfig {
    /// Name of the extended service
    pub fn service(&self) -> &str {
        match self {
            ExtendsConfig::Name(name) => name,
            ExtendsConfig::Full { service, .. } => service,
        }
    }

    /// File holding the extended service, if not the current document
    pub fn file(&self) -> Option<&str> {
        match self {
            ExtendsConfig::Name(_) => None,
            ExtendsConfig::Full { file, .. } => file.as_deref(),
        }
    }
}

/// Command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    /// Single string, split on whitespace
    Shell(String),
    /// Pre-split argument list
    Exec(Vec<String>),
}

impl CommandConfig {
    /// Argument tokens
    pub fn tokens(&self) -> Vec<String> {
        match self {
            CommandConfig::Shell(s) => s.split_whitespace().map(str::to_string).collect(),
            CommandConfig::Exec(args) => args.clone(),
        }
    }
}

/// Environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentConfig {
    /// Array of KEY=value strings
    Array(Vec<String>),
    /// Map of key to value
    Map(Mapping),
}

/// Env file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvFileConfig {
    /// Single file
    Single(String),
    /// Multiple files
    Multiple(Vec<String>),
}

impl EnvFileConfig {
    /// Referenced file paths
    pub fn paths(&self) -> Vec<&str> {
        match self {
            EnvFileConfig::Single(path) => vec![path.as_str()],
            EnvFileConfig::Multiple(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

/// Labels configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelsConfig {
    /// Array of "key=value" strings
    Array(Vec<String>),
    /// Map of key to value
    Map(Mapping),
}

impl LabelsConfig {
    /// `key=value` tokens in declaration order
    pub fn tokens(&self) -> std::result::Result<Vec<String>, String> {
        match self {
            LabelsConfig::Array(labels) => Ok(labels.clone()),
            LabelsConfig::Map(map) => Ok(mapping_pairs(map)?
                .into_iter()
                .map(|(key, value)| format!("{}={}", key, value.unwrap_or_default()))
                .collect()),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Driver
    #[serde(default)]
    pub driver: Option<String>,
    /// Options
    #[serde(default)]
    pub options: Option<Mapping>,
}

/// Healthcheck configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthcheckConfig {
    /// Test command
    #[serde(default)]
    pub test: Option<HealthcheckTest>,
    /// Interval
    #[serde(default)]
    pub interval: Option<Scalar>,
    /// Timeout
    #[serde(default)]
    pub timeout: Option<Scalar>,
    /// Retries
    #[serde(default)]
    pub retries: Option<Scalar>,
    /// Start period
    #[serde(default)]
    pub start_period: Option<Scalar>,
    /// Disable healthcheck
    #[serde(default)]
    pub disable: Option<bool>,
}

/// Healthcheck test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HealthcheckTest {
    /// Command string, run through the shell
    Command(String),
    /// `[CMD|CMD-SHELL|NONE, args...]`
    Array(Vec<String>),
}

/// Deploy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Deployment mode (replicated, global)
    #[serde(default)]
    pub mode: Option<String>,
    /// Number of replicas
    #[serde(default)]
    pub replicas: Option<Scalar>,
    /// Placement constraints
    #[serde(default)]
    pub placement: Option<PlacementConfig>,
    /// Resource limits and reservations
    #[serde(default)]
    pub resources: Option<ResourcesConfig>,
    /// Restart policy
    #[serde(default)]
    pub restart_policy: Option<RestartPolicyConfig>,
    /// Update configuration
    #[serde(default)]
    pub update_config: Option<UpdateConfig>,
    /// Endpoint mode (vip, dnsrr)
    #[serde(default)]
    pub endpoint_mode: Option<String>,
}

/// Placement configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Constraints
    #[serde(default)]
    pub constraints: Option<Vec<String>>,
}

/// Resources configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Resource limits
    #[serde(default)]
    pub limits: Option<ResourceSpec>,
    /// Resource reservations
    #[serde(default)]
    pub reservations: Option<ResourceSpec>,
}

/// Resource specification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// CPUs
    #[serde(default)]
    pub cpus: Option<Scalar>,
    /// Memory
    #[serde(default)]
    pub memory: Option<Scalar>,
}

/// Restart policy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestartPolicyConfig {
    /// Condition (none, on-failure, any)
    #[serde(default)]
    pub condition: Option<String>,
    /// Delay between retries
    #[serde(default)]
    pub delay: Option<Scalar>,
    /// Maximum attempts
    #[serde(default)]
    pub max_attempts: Option<Scalar>,
    /// Window for counting retries
    #[serde(default)]
    pub window: Option<Scalar>,
}

/// Update configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Delay between updates
    #[serde(default)]
    pub delay: Option<Scalar>,
    /// Failure action
    #[serde(default)]
    pub failure_action: Option<String>,
    /// Max failure ratio
    #[serde(default)]
    pub max_failure_ratio: Option<Scalar>,
    /// Monitor duration
    #[serde(default)]
    pub monitor: Option<Scalar>,
    /// Parallelism
    #[serde(default)]
    pub parallelism: Option<Scalar>,
}

/// Port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortConfig {
    /// Short syntax: "8080:80"
    Short(Scalar),
    /// Long syntax
    Long(PortConfigLong),
}

/// Long port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfigLong {
    /// Target port in container
    pub target: Scalar,
    /// Published port
    #[serde(default)]
    pub published: Option<Scalar>,
    /// Protocol (tcp/udp)
    #[serde(default)]
    pub protocol: Option<String>,
    /// Mode (host/ingress)
    #[serde(default)]
    pub mode: Option<String>,
}

impl fmt::Display for PortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortConfig::Short(port) => write!(f, "{}", port),
            PortConfig::Long(port) => {
                let mut parts = Vec::new();
                if let Some(published) = &port.published {
                    parts.push(format!("published={}", published));
                }
                parts.push(format!("target={}", port.target));
                if let Some(protocol) = &port.protocol {
                    parts.push(format!("protocol={}", protocol));
                }
                if let Some(mode) = &port.mode {
                    parts.push(format!("mode={}", mode));
                }
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Volume mount configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeMount {
    /// Short syntax: "source:target[:ro]"
    Short(String),
    /// Long syntax
    Long(VolumeMountLong),
}

/// Long volume mount configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeMountLong {
    /// Mount type (volume, bind)
    #[serde(rename = "type", default)]
    pub mount_type: Option<String>,
    /// Source path or volume name
    #[serde(default)]
    pub source: Option<String>,
    /// Target path in container
    pub target: String,
    /// Read only
    #[serde(default)]
    pub read_only: Option<bool>,
}

/// Networks a service is attached to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NetworksConfig {
    /// Array of network names
    Array(Vec<String>),
    /// Map of network name to per-service options
    Map(Mapping),
}

impl NetworksConfig {
    /// Network names in declaration order
    pub fn names(&self) -> std::result::Result<Vec<String>, String> {
        match self {
            NetworksConfig::Array(names) => Ok(names.clone()),
            NetworksConfig::Map(map) => map
                .keys()
                .map(|key| scalar_text(key)?.ok_or_else(|| "null network name".to_string()))
                .collect(),
        }
    }
}

/// Top-level network definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Driver
    #[serde(default)]
    pub driver: Option<String>,
    /// Driver options
    #[serde(default)]
    pub driver_opts: Option<Mapping>,
    /// External network
    #[serde(default)]
    pub external: Option<ExternalConfig>,
}

/// Top-level volume definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Driver
    #[serde(default)]
    pub driver: Option<String>,
    /// Driver options
    #[serde(default)]
    pub driver_opts: Option<Mapping>,
    /// External volume
    #[serde(default)]
    pub external: Option<ExternalConfig>,
}

/// External resource marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalConfig {
    /// Boolean
    Bool(bool),
    /// With name
    Named { name: String },
}

impl ExternalConfig {
    /// Whether the resource is pre-existing
    pub fn is_external(&self) -> bool {
        !matches!(self, ExternalConfig::Bool(false))
    }

    /// Real name of a named external resource
    pub fn name(&self) -> Option<&str> {
        match self {
            ExternalConfig::Named { name } => Some(name),
            ExternalConfig::Bool(_) => None,
        }
    }
}
