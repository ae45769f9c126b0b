//! `extends` resolution
//!
//! A service may inherit every field it does not set itself from another
//! service, either in the same document or in another compose file. The
//! referenced definition is copied and merged into the extending one with
//! [`EnvironmentMerge`], so the extending service keeps its own values.

use super::config::ExtendsConfig;
use super::merge::{merge, EnvironmentMerge};
use crate::error::{Result, SwarmComposeError};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Loads compose documents referenced by `extends.file`
pub trait DocumentSource {
    /// Load and parse the document at `path`
    fn load(&self, path: &Path) -> Result<Value>;
}

/// Resolves `extends` across one invocation
///
/// Cycles are detected on `(file, service)` pairs, so a service may extend
/// another service of its own file through `extends.file`.
pub struct ExtendsResolver<'a> {
    source: &'a dyn DocumentSource,
    files: HashMap<PathBuf, Mapping>,
    resolved: HashMap<ServiceKey, Mapping>,
    stack: Vec<ServiceKey>,
}

/// A service within a document; `None` is the document being resolved
type ServiceKey = (Option<PathBuf>, String);

/// Services of one document and where its relative paths start
struct Document {
    file: Option<PathBuf>,
    services: Mapping,
    base_dir: PathBuf,
}

impl<'a> ExtendsResolver<'a> {
    /// Create a resolver loading external files through `source`
    pub fn new(source: &'a dyn DocumentSource) -> Self {
        Self {
            source,
            files: HashMap::new(),
            resolved: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Resolve every service of a document, keeping their order.
    ///
    /// Relative `extends.file` paths are taken from `base_dir`.
    pub fn resolve_services(&mut self, services: &Mapping, base_dir: &Path) -> Result<Mapping> {
        self.resolved.retain(|(file, _), _| file.is_some());

        let document = Document {
            file: None,
            services: services.clone(),
            base_dir: base_dir.to_path_buf(),
        };

        let mut resolved = Mapping::new();
        for key in services.keys() {
            let name = service_name(key)?;
            let definition = self.resolve_service(&document, &name)?;
            resolved.insert(key.clone(), Value::Mapping(definition));
        }
        Ok(resolved)
    }

    fn resolve_service(&mut self, document: &Document, name: &str) -> Result<Mapping> {
        let key = (document.file.clone(), name.to_string());

        if let Some(done) = self.resolved.get(&key) {
            return Ok(done.clone());
        }

        if self.stack.contains(&key) {
            let chain = self
                .stack
                .iter()
                .chain(std::iter::once(&key))
                .map(describe)
                .collect::<Vec<_>>();
            return Err(SwarmComposeError::ExtendsCycle(chain.join(" -> ")));
        }

        let mut definition = match document.services.get(name) {
            Some(Value::Mapping(definition)) => definition.clone(),
            Some(Value::Null) => Mapping::new(),
            Some(_) => {
                return Err(SwarmComposeError::InvalidConfig(format!(
                    "Service '{}' must be a mapping",
                    describe(&key)
                )))
            }
            None => return Err(SwarmComposeError::ServiceNotFound(describe(&key))),
        };

        let Some(extends) = definition.shift_remove("extends") else {
            self.resolved.insert(key, definition.clone());
            return Ok(definition);
        };

        let extends: ExtendsConfig =
            serde_yaml::from_value(extends).map_err(|e| SwarmComposeError::InvalidField {
                service: name.to_string(),
                field: "extends".to_string(),
                reason: e.to_string(),
            })?;

        self.stack.push(key.clone());
        let parent = match extends.file() {
            Some(file) => self
                .load_document(&document.base_dir.join(file))
                .and_then(|parent| self.resolve_service(&parent, extends.service())),
            None => self.resolve_service(document, extends.service()),
        };
        self.stack.pop();
        let parent = parent?;

        tracing::debug!("Service {} extends {}", name, extends.service());

        let merged = match merge(
            Value::Mapping(definition),
            &Value::Mapping(parent),
            Some(&EnvironmentMerge),
        )? {
            Value::Mapping(merged) => merged,
            _ => {
                return Err(SwarmComposeError::InvalidConfig(format!(
                    "Service '{}' must be a mapping",
                    name
                )))
            }
        };

        self.resolved.insert(key, merged.clone());
        Ok(merged)
    }

    /// Services of an external file, loaded once per invocation.
    ///
    /// On first load every service of the file is resolved.
    fn load_document(&mut self, path: &Path) -> Result<Document> {
        let file = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let base_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(services) = self.files.get(&file) {
            return Ok(Document {
                file: Some(file),
                services: services.clone(),
                base_dir,
            });
        }

        tracing::debug!("Loading extended file {}", file.display());
        let services = match self.source.load(&file)?.get("services") {
            Some(Value::Mapping(services)) => services.clone(),
            None | Some(Value::Null) => Mapping::new(),
            Some(_) => {
                return Err(SwarmComposeError::ComposeParse(format!(
                    "'services' in {} must be a mapping",
                    file.display()
                )))
            }
        };
        self.files.insert(file.clone(), services.clone());

        let document = Document {
            file: Some(file),
            services,
            base_dir,
        };
        for key in document.services.keys() {
            let name = service_name(key)?;
            self.resolve_service(&document, &name)?;
        }
        Ok(document)
    }
}

fn describe((file, service): &ServiceKey) -> String {
    match file {
        Some(file) => format!("{} (in {})", service, file.display()),
        None => service.clone(),
    }
}

fn service_name(key: &Value) -> Result<String> {
    match key {
        Value::String(name) => Ok(name.clone()),
        other => Err(SwarmComposeError::InvalidConfig(format!(
            "Service names must be strings, found {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct FileSource;

    impl DocumentSource for FileSource {
        fn load(&self, path: &Path) -> Result<Value> {
            let content = fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    fn services(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn resolve(yaml: &str) -> Result<Mapping> {
        let source = FileSource;
        let mut resolver = ExtendsResolver::new(&source);
        resolver.resolve_services(&services(yaml), Path::new("/nonexistent"))
    }

    #[test]
    fn test_extending_service_keeps_its_own_fields() {
        let resolved = resolve(
            r#"
web:
  extends:
    service: base
  image: x
base:
  image: y
  mem_limit: 1g
"#,
        )
        .unwrap();

        let web = resolved.get("web").unwrap();
        assert_eq!(web, &serde_yaml::from_str::<Value>("{image: x, mem_limit: 1g}").unwrap());
    }

    #[test]
    fn test_referenced_definition_is_not_mutated() {
        let resolved = resolve(
            r#"
base:
  image: y
  ports: ['80:80']
web:
  extends: base
  ports: ['443:443']
"#,
        )
        .unwrap();

        let base = resolved.get("base").unwrap();
        assert_eq!(base.get("ports").unwrap().as_sequence().unwrap().len(), 1);
        let web = resolved.get("web").unwrap();
        assert_eq!(web.get("ports").unwrap().as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_chained_extends_resolves_later_definitions() {
        let resolved = resolve(
            r#"
app:
  extends: {service: middle}
middle:
  extends: {service: root}
  hostname: middle
root:
  image: root-image
"#,
        )
        .unwrap();

        let keys: Vec<_> = resolved.keys().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["app", "middle", "root"]);

        let app = resolved.get("app").unwrap();
        assert_eq!(app.get("image").unwrap().as_str(), Some("root-image"));
        assert_eq!(app.get("hostname").unwrap().as_str(), Some("middle"));
        assert!(app.get("extends").is_none());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = resolve(
            r#"
a:
  extends: b
b:
  extends: a
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SwarmComposeError::ExtendsCycle(_)));
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let err = resolve("a:\n  extends: nope\n").unwrap_err();
        assert!(matches!(err, SwarmComposeError::ServiceNotFound(_)));
    }

    #[test]
    fn test_extends_from_another_file() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("common")).unwrap();
        fs::write(
            temp.path().join("common/base.yml"),
            r#"
services:
  base:
    extends:
      service: root
      file: root.yml
    environment:
      - LEVEL=base
  unrelated:
    image: other
"#,
        )
        .unwrap();
        fs::write(
            temp.path().join("common/root.yml"),
            "services:\n  root:\n    image: root-image\n",
        )
        .unwrap();

        let source = FileSource;
        let mut resolver = ExtendsResolver::new(&source);
        let resolved = resolver
            .resolve_services(
                &services(
                    r#"
web:
  extends:
    service: base
    file: common/base.yml
  environment:
    MODE: prod
"#,
                ),
                temp.path(),
            )
            .unwrap();

        let web = resolved.get("web").unwrap();
        assert_eq!(web.get("image").unwrap().as_str(), Some("root-image"));
        assert_eq!(
            web.get("environment").unwrap(),
            &serde_yaml::from_str::<Value>("['LEVEL=base', 'MODE=prod']").unwrap()
        );
    }

    #[test]
    fn test_extends_file_may_name_its_own_file() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("docker-compose.yml");
        let content = r#"
services:
  base:
    image: x
  web:
    extends:
      service: base
      file: docker-compose.yml
    hostname: web
"#;
        fs::write(&file, content).unwrap();

        let document: Value = serde_yaml::from_str(content).unwrap();
        let source = FileSource;
        let mut resolver = ExtendsResolver::new(&source);
        let resolved = resolver
            .resolve_services(
                document.get("services").unwrap().as_mapping().unwrap(),
                temp.path(),
            )
            .unwrap();

        let web = resolved.get("web").unwrap();
        assert_eq!(web.get("image").unwrap().as_str(), Some("x"));
        assert_eq!(web.get("hostname").unwrap().as_str(), Some("web"));
    }

    #[test]
    fn test_files_referencing_each_other_without_cycle() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("a.yml"),
            r#"
services:
  a:
    extends: {service: b, file: b.yml}
    hostname: a
  c:
    image: c-image
"#,
        )
        .unwrap();
        fs::write(
            temp.path().join("b.yml"),
            "services:\n  b:\n    extends: {service: c, file: a.yml}\n    mem_limit: 1g\n",
        )
        .unwrap();

        let source = FileSource;
        let mut resolver = ExtendsResolver::new(&source);
        let resolved = resolver
            .resolve_services(
                &services("web:\n  extends: {service: a, file: a.yml}\n"),
                temp.path(),
            )
            .unwrap();

        let web = resolved.get("web").unwrap();
        assert_eq!(web.get("image").unwrap().as_str(), Some("c-image"));
        assert_eq!(web.get("hostname").unwrap().as_str(), Some("a"));
        assert_eq!(web.get("mem_limit").unwrap().as_str(), Some("1g"));
    }

    #[test]
    fn test_self_extension_through_own_file_is_a_cycle() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("docker-compose.yml"),
            "services:\n  web:\n    extends: {service: web, file: docker-compose.yml}\n",
        )
        .unwrap();

        let source = FileSource;
        let mut resolver = ExtendsResolver::new(&source);
        let err = resolver
            .resolve_services(
                &services("web:\n  extends: {service: web, file: docker-compose.yml}\n"),
                temp.path(),
            )
            .unwrap_err();
        assert!(matches!(err, SwarmComposeError::ExtendsCycle(_)));
    }

    #[test]
    fn test_cross_file_cycle_is_rejected() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("a.yml"),
            "services:\n  a:\n    extends: {service: b, file: b.yml}\n",
        )
        .unwrap();
        fs::write(
            temp.path().join("b.yml"),
            "services:\n  b:\n    extends: {service: a, file: a.yml}\n",
        )
        .unwrap();

        let source = FileSource;
        let mut resolver = ExtendsResolver::new(&source);
        let err = resolver
            .resolve_services(
                &services("web:\n  extends: {service: a, file: a.yml}\n"),
                temp.path(),
            )
            .unwrap_err();
        assert!(matches!(err, SwarmComposeError::ExtendsCycle(_)));
    }
}
