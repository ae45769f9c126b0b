//! Compose file parser

use super::extends::{DocumentSource, ExtendsResolver};
use super::merge::merge_all;
use super::project::{Project, ProjectContext};
use crate::error::{Result, SwarmComposeError};
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Compose file used when none is configured
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Default compose file names, in lookup order
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yaml",
    "compose.yml",
];

/// Compose file parser
#[derive(Debug, Clone, Default)]
pub struct ComposeParser {
    /// Variables available to `${VAR}` interpolation
    env: HashMap<String, String>,
}

impl ComposeParser {
    /// Create a parser interpolating from `env`
    pub fn new(env: HashMap<String, String>) -> Self {
        Self { env }
    }

    /// Find compose file in directory
    pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
        DEFAULT_COMPOSE_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Parse compose file from path
    pub fn parse_file(&self, path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SwarmComposeError::ComposeParse(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.parse_str(&content).map_err(|e| match e {
            SwarmComposeError::ComposeParse(msg) => {
                SwarmComposeError::ComposeParse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse compose document from string
    pub fn parse_str(&self, content: &str) -> Result<Value> {
        let mut document: Value = serde_yaml::from_str(content)
            .map_err(|e| SwarmComposeError::ComposeParse(format!("Failed to parse YAML: {}", e)))?;

        match document {
            Value::Null => return Ok(Value::Mapping(Mapping::new())),
            Value::Mapping(_) => {}
            _ => {
                return Err(SwarmComposeError::ComposeParse(
                    "top level must be a mapping".to_string(),
                ))
            }
        }

        interpolate_value(&mut document, &self.env);
        Ok(document)
    }

    /// Parse multiple compose files and merge them in order
    pub fn parse_files(&self, paths: &[PathBuf]) -> Result<Value> {
        let documents = paths
            .iter()
            .map(|path| {
                tracing::debug!("Reading compose file {}", path.display());
                self.parse_file(path)
            })
            .collect::<Result<Vec<_>>>()?;

        merge_all(documents)
    }

    /// Parse, merge and resolve `extends` for a whole project
    pub fn load_project(&self, paths: &[PathBuf], context: ProjectContext) -> Result<Project> {
        let mut document = self.parse_files(paths)?;

        let services = match document.get("services") {
            Some(Value::Mapping(services)) => services.clone(),
            None | Some(Value::Null) => Mapping::new(),
            Some(_) => {
                return Err(SwarmComposeError::ComposeParse(
                    "'services' must be a mapping".to_string(),
                ))
            }
        };

        let mut resolver = ExtendsResolver::new(self);
        let resolved = resolver.resolve_services(&services, context.base_dir())?;

        if let Value::Mapping(root) = &mut document {
            root.insert(Value::String("services".to_string()), Value::Mapping(resolved));
        }

        Project::new(context, document)
    }
}

impl DocumentSource for ComposeParser {
    fn load(&self, path: &Path) -> Result<Value> {
        self.parse_file(path)
    }
}

fn interpolation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?-)([^}]*))?\}|([A-Za-z_][A-Za-z0-9_]*))",
        )
        .expect("interpolation pattern is valid")
    })
}

/// Interpolate every string scalar of a document in place
fn interpolate_value(value: &mut Value, env: &HashMap<String, String>) {
    match value {
        Value::String(s) if s.contains('$') => *s = interpolate_string(s, env),
        Value::Sequence(items) => {
            for item in items {
                interpolate_value(item, env);
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                interpolate_value(item, env);
            }
        }
        _ => {}
    }
}

/// Interpolate `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}` and `$$`
fn interpolate_string(s: &str, env: &HashMap<String, String>) -> String {
    interpolation_pattern()
        .replace_all(s, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }

            let var = caps
                .get(2)
                .or_else(|| caps.get(5))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let value = env.get(var);

            match (caps.get(3).map(|m| m.as_str()), caps.get(4)) {
                (Some(":-"), Some(default)) => value
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .unwrap_or_else(|| default.as_str().to_string()),
                (Some(_), Some(default)) => value
                    .cloned()
                    .unwrap_or_else(|| default.as_str().to_string()),
                _ => value.cloned().unwrap_or_else(|| {
                    tracing::warn!(
                        "The {} variable is not set. Defaulting to a blank string.",
                        var
                    );
                    String::new()
                }),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_simple_compose() {
        let yaml = r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
  db:
    image: postgres:13
    environment:
      POSTGRES_PASSWORD: secret
"#;

        let document = ComposeParser::default().parse_str(yaml).unwrap();
        let services = document.get("services").unwrap().as_mapping().unwrap();
        assert_eq!(services.len(), 2);
        let names: Vec<_> = services.keys().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(names, vec!["web", "db"]);
    }

    #[test]
    fn test_empty_document_is_empty_mapping() {
        let document = ComposeParser::default().parse_str("").unwrap();
        assert_eq!(document, Value::Mapping(Mapping::new()));
        assert!(ComposeParser::default().parse_str("- a\n- b").is_err());
    }

    #[test]
    fn test_interpolate() {
        let env = env(&[("TAG", "1.0.0"), ("EMPTY", "")]);

        assert_eq!(interpolate_string("nginx:${TAG}", &env), "nginx:1.0.0");
        assert_eq!(interpolate_string("nginx:$TAG", &env), "nginx:1.0.0");
        assert_eq!(interpolate_string("${MISSING:-2.0}", &env), "2.0");
        assert_eq!(interpolate_string("${EMPTY:-fallback}", &env), "fallback");
        assert_eq!(interpolate_string("${EMPTY-fallback}", &env), "");
        assert_eq!(interpolate_string("cost: $$5", &env), "cost: $5");
        assert_eq!(interpolate_string("${MISSING}", &env), "");
    }

    #[test]
    fn test_later_files_override_and_extend() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("docker-compose.yml");
        let overlay = temp.path().join("docker-compose.prod.yml");
        fs::write(
            &base,
            "services:\n  web:\n    image: nginx\n    ports: ['80:80']\n",
        )
        .unwrap();
        fs::write(
            &overlay,
            "services:\n  web:\n    ports: ['443:443']\n    hostname: web\n",
        )
        .unwrap();

        let parser = ComposeParser::default();
        let project = parser
            .load_project(&[base, overlay], ProjectContext::new("app", temp.path()))
            .unwrap();

        let web = project.service("web").unwrap();
        assert_eq!(web.get("hostname").unwrap().as_str(), Some("web"));
        assert_eq!(web.get("ports").unwrap().as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_conflicting_files_fail() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("a.yml");
        let overlay = temp.path().join("b.yml");
        fs::write(&base, "services:\n  web:\n    image: nginx\n").unwrap();
        fs::write(&overlay, "services:\n  web:\n    image: httpd\n").unwrap();

        let err = ComposeParser::default().parse_files(&[base, overlay]).unwrap_err();
        assert!(matches!(err, SwarmComposeError::MergeConflict { .. }));
    }

    #[test]
    fn test_load_project_resolves_extends_with_interpolation() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("docker-compose.yml");
        fs::write(
            &file,
            r#"
services:
  base:
    image: "registry/app:${TAG}"
    mem_limit: 1g
  worker:
    extends:
      service: base
    command: run worker
"#,
        )
        .unwrap();

        let parser = ComposeParser::new(env(&[("TAG", "42")]));
        let project = parser
            .load_project(&[file], ProjectContext::new("app", temp.path()))
            .unwrap();

        assert_eq!(project.image("worker").unwrap(), "registry/app:42");
        let worker = project.service("worker").unwrap();
        assert!(worker.get("extends").is_none());
        assert_eq!(worker.get("mem_limit").unwrap().as_str(), Some("1g"));
    }

    #[test]
    fn test_find_compose_file() {
        let temp = tempdir().unwrap();
        assert!(ComposeParser::find_compose_file(temp.path()).is_none());
        fs::write(temp.path().join("compose.yaml"), "services: {}").unwrap();
        assert_eq!(
            ComposeParser::find_compose_file(temp.path()).unwrap(),
            temp.path().join("compose.yaml")
        );
    }
}
