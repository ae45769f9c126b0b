//! Error types for swarm-compose

use thiserror::Error;

/// Result type for swarm-compose operations
pub type Result<T> = std::result::Result<T, SwarmComposeError>;

/// swarm-compose error types
#[derive(Error, Debug)]
pub enum SwarmComposeError {
    #[error("Conflict at {path}")]
    MergeConflict { path: String },

    #[error("Service '{service}' uses network '{network}' which is not defined in networks")]
    UndefinedNetwork { service: String, network: String },

    #[error("No image specified for service '{0}'")]
    MissingImage(String),

    #[error("Unsupported parameter '{field}' in service '{service}': {reason}")]
    UnsupportedField {
        service: String,
        field: String,
        reason: String,
    },

    #[error("Invalid value for '{field}' in service '{service}': {reason}")]
    InvalidField {
        service: String,
        field: String,
        reason: String,
    },

    #[error("Command \"{command}\" failed with exit code {code}: {output}")]
    ExternalCommandFailure {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Circular extends detected: {0}")]
    ExtendsCycle(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Image pull failed on {} node(s): {}", .0.len(), .0.join("; "))]
    PullFailed(Vec<String>),

    #[error("Compose file parse error: {0}")]
    ComposeParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SwarmComposeError {
    /// Process exit code to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SwarmComposeError::ExternalCommandFailure { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
