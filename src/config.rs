//! Run configuration
//!
//! Resolves compose files, project name and interpolation variables from
//! command-line options, the process environment and a `.env` file.

use crate::compose::parser::{ComposeParser, DEFAULT_COMPOSE_FILE};
use crate::error::{Result, SwarmComposeError};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Defaults file read from the working directory
pub const DOTENV_FILE: &str = ".env";

/// Separator of `COMPOSE_FILE` when `COMPOSE_PATH_SEPARATOR` is unset
pub const DEFAULT_PATH_SEPARATOR: &str = ":";

/// Variables visible to a run
///
/// Process variables take precedence over `.env` entries. The process
/// environment itself is never modified.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Process environment layered over `<dir>/.env`
    pub fn load(dir: &Path) -> Result<Self> {
        let mut env = Self::from_dotenv(&dir.join(DOTENV_FILE))?;
        env.vars.extend(std::env::vars());
        Ok(env)
    }

    /// Only the entries of a `.env` file; a missing file is empty
    pub fn from_dotenv(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!("Loaded defaults from {}", path.display());
                Ok(Self {
                    vars: parse_dotenv(&content),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SwarmComposeError::InvalidConfig(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Build from explicit variables
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Look up a non-empty variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Parser interpolating from these variables
    pub fn parser(&self) -> ComposeParser {
        ComposeParser::new(self.vars.clone())
    }
}

/// Parse `KEY=VALUE` lines; blank lines and `#` comments are skipped
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Resolved inputs of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Compose files, later ones override earlier ones
    pub files: Vec<PathBuf>,
    /// Normalized project name
    pub project_name: String,
    /// Directory of the first compose file
    pub base_dir: PathBuf,
}

impl Settings {
    /// Resolve settings from options, environment and working directory
    ///
    /// Files come from `files`, then `COMPOSE_FILE`, then the first default
    /// compose file found in `cwd`. The project name comes from
    /// `project_name`, then `COMPOSE_PROJECT_NAME`, then the name of the
    /// first file's directory.
    pub fn resolve(
        files: &[PathBuf],
        project_name: Option<&str>,
        env: &Environment,
        cwd: &Path,
    ) -> Result<Self> {
        let files: Vec<PathBuf> = if !files.is_empty() {
            files.to_vec()
        } else if let Some(compose_file) = env.get("COMPOSE_FILE") {
            let separator = env
                .get("COMPOSE_PATH_SEPARATOR")
                .unwrap_or(DEFAULT_PATH_SEPARATOR);
            compose_file
                .split(separator)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
                .collect()
        } else {
            vec![ComposeParser::find_compose_file(cwd)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPOSE_FILE))]
        };

        let files: Vec<PathBuf> = files
            .into_iter()
            .map(|path| if path.is_absolute() { path } else { cwd.join(path) })
            .collect();

        let first = files
            .first()
            .ok_or_else(|| SwarmComposeError::InvalidConfig("No compose file given".to_string()))?;
        let base_dir = first
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());

        let raw_name = match project_name.or_else(|| env.get("COMPOSE_PROJECT_NAME")) {
            Some(name) => name.to_string(),
            None => base_dir
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
        };

        Ok(Self {
            files,
            project_name: normalize_project_name(&raw_name),
            base_dir,
        })
    }
}

/// Lowercase the name and drop characters outside `[a-z0-9_-]`
pub fn normalize_project_name(name: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^a-z0-9_-]").expect("valid regex"));
    invalid.replace_all(&name.to_lowercase(), "").to_string()
}
