//! Resolved compose project

use super::config::{DeployConfig, NetworkConfig, Scalar, VolumeConfig};
use crate::error::{Result, SwarmComposeError};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Project name and base directory shared by every command of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    name: String,
    base_dir: PathBuf,
}

impl ProjectContext {
    /// Create a project context
    pub fn new(name: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            base_dir: base_dir.into(),
        }
    }

    /// Project name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory relative paths are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Prefix a resource name with the project name, if any
    pub fn prefix(&self, value: &str) -> String {
        if self.name.is_empty() {
            value.to_string()
        } else {
            format!("{}_{}", self.name, value)
        }
    }
}

/// A merged and `extends`-resolved compose document
#[derive(Debug, Clone)]
pub struct Project {
    context: ProjectContext,
    document: Value,
    services: Vec<(String, Mapping)>,
    networks: Vec<(String, NetworkConfig)>,
    volumes: Vec<(String, VolumeConfig)>,
}

impl Project {
    /// Build a project from a resolved document
    pub fn new(context: ProjectContext, document: Value) -> Result<Self> {
        let services = section(&document, "services")?
            .into_iter()
            .map(|(name, value)| match value {
                Value::Mapping(definition) => Ok((name, definition)),
                Value::Null => Ok((name, Mapping::new())),
                _ => Err(SwarmComposeError::InvalidConfig(format!(
                    "Service '{}' must be a mapping",
                    name
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let networks = typed_section::<NetworkConfig>(&document, "networks")?;
        let volumes = typed_section::<VolumeConfig>(&document, "volumes")?;

        Ok(Self {
            context,
            document,
            services,
            networks,
            volumes,
        })
    }

    /// Project context
    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    /// The resolved document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Service names in declaration order
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|(name, _)| name.as_str())
    }

    /// Definition of a service
    pub fn service(&self, name: &str) -> Result<&Mapping> {
        self.services
            .iter()
            .find(|(service, _)| service == name)
            .map(|(_, definition)| definition)
            .ok_or_else(|| SwarmComposeError::ServiceNotFound(name.to_string()))
    }

    /// Declared networks
    pub fn networks(&self) -> &[(String, NetworkConfig)] {
        &self.networks
    }

    /// Declared network by name
    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks
            .iter()
            .find(|(network, _)| network == name)
            .map(|(_, config)| config)
    }

    /// Declared volumes
    pub fn volumes(&self) -> &[(String, VolumeConfig)] {
        &self.volumes
    }

    /// Services targeted by a command; all services when `requested` is empty
    pub fn select_services(&self, requested: &[String]) -> Result<Vec<String>> {
        if let Some(unknown) = requested
            .iter()
            .find(|name| !self.services.iter().any(|(service, _)| service == *name))
        {
            return Err(SwarmComposeError::ServiceNotFound(unknown.clone()));
        }

        Ok(self
            .service_names()
            .filter(|name| requested.is_empty() || requested.iter().any(|r| r == name))
            .map(str::to_string)
            .collect())
    }

    /// Image of a service
    pub fn image(&self, name: &str) -> Result<String> {
        match self.service(name)?.get("image") {
            Some(image) => match super::config::scalar_text(image) {
                Ok(Some(image)) => Ok(image),
                _ => Err(SwarmComposeError::MissingImage(name.to_string())),
            },
            None => Err(SwarmComposeError::MissingImage(name.to_string())),
        }
    }

    /// Declared replica count: `deploy.replicas`, then `replicas`, then 1
    pub fn replicas(&self, name: &str) -> Result<u64> {
        let definition = self.service(name)?;
        let deploy = self.deploy(name)?;

        let declared = match deploy.and_then(|deploy| deploy.replicas) {
            Some(replicas) => Some(replicas),
            None => definition
                .get("replicas")
                .map(|value| serde_yaml::from_value::<Scalar>(value.clone()))
                .transpose()
                .map_err(|e| invalid_field(name, "replicas", e))?,
        };

        match declared {
            Some(replicas) => replicas
                .as_u64()
                .ok_or_else(|| invalid_field(name, "replicas", "expected a replica count")),
            None => Ok(1),
        }
    }

    /// Whether the service runs in global mode (one task per node)
    pub fn is_global(&self, name: &str) -> Result<bool> {
        Ok(self
            .deploy(name)?
            .and_then(|deploy| deploy.mode)
            .is_some_and(|mode| mode == "global"))
    }

    fn deploy(&self, name: &str) -> Result<Option<DeployConfig>> {
        self.service(name)?
            .get("deploy")
            .map(|value| serde_yaml::from_value::<DeployConfig>(value.clone()))
            .transpose()
            .map_err(|e| invalid_field(name, "deploy", e))
    }
}

fn invalid_field(service: &str, field: &str, reason: impl ToString) -> SwarmComposeError {
    SwarmComposeError::InvalidField {
        service: service.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn section(document: &Value, name: &str) -> Result<Vec<(String, Value)>> {
    match document.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Mapping(entries)) => entries
            .iter()
            .map(|(key, value)| match key {
                Value::String(key) => Ok((key.clone(), value.clone())),
                other => Err(SwarmComposeError::InvalidConfig(format!(
                    "Entry names in '{}' must be strings, found {:?}",
                    name, other
                ))),
            })
            .collect(),
        Some(_) => Err(SwarmComposeError::InvalidConfig(format!(
            "'{}' must be a mapping",
            name
        ))),
    }
}

fn typed_section<T>(document: &Value, name: &str) -> Result<Vec<(String, T)>>
where
    T: serde::de::DeserializeOwned + Default,
{
    section(document, name)?
        .into_iter()
        .map(|(entry, value)| {
            let config = match value {
                Value::Null => T::default(),
                value => serde_yaml::from_value(value).map_err(|e| {
                    SwarmComposeError::InvalidConfig(format!("{} '{}': {}", name, entry, e))
                })?,
            };
            Ok((entry, config))
        })
        .collect()
}
