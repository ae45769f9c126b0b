//! Translation of service definitions into `docker service create`
//!
//! Each compose field is handled by one [`Rule`] looked up by name in
//! [`RULES`]. Rules are pure: they see the field's value and the
//! [`TranslationContext`] and return the tokens the field contributes.
//! Fields without a rule produce a [`Diagnostic`] and are skipped.

use super::command::{CommandToken, ServiceCreate};
use crate::compose::config::{
    mapping_pairs, scalar_text, CommandConfig, DeployConfig, EnvFileConfig, EnvironmentConfig,
    HealthcheckConfig, HealthcheckTest, LabelsConfig, LoggingConfig, NetworksConfig, PortConfig,
    Scalar, VolumeMount, VolumeMountLong,
};
use crate::compose::Project;
use crate::error::{Result, SwarmComposeError};
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Log driver used when `logging.driver` is not set
pub const DEFAULT_LOG_DRIVER: &str = "json-file";

/// Translation rule for one field
pub type Rule = fn(&Value, &TranslationContext<'_>) -> Result<Vec<CommandToken>>;

/// Field name to rule
pub const RULES: &[(&str, Rule)] = &[
    ("restart", restart),
    ("logging", logging),
    ("mem_limit", mem_limit),
    ("image", image),
    ("command", command),
    ("expose", unsupported),
    ("extra_hosts", unsupported),
    ("container_name", unsupported),
    ("hostname", hostname),
    ("healthcheck", healthcheck),
    ("labels", labels),
    ("deploy", deploy),
    ("ports", ports),
    ("networks", networks),
    ("volumes", volumes),
    ("environment", environment),
    ("env_file", env_file),
];

/// Look up the rule for a field
pub fn rule_for(field: &str) -> Option<Rule> {
    RULES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, rule)| *rule)
}

/// What a rule may look at besides the field value
pub struct TranslationContext<'a> {
    /// Service being translated
    pub service: &'a str,
    /// Field being translated
    pub field: &'a str,
    /// Project the service belongs to
    pub project: &'a Project,
}

impl TranslationContext<'_> {
    fn parse<T: DeserializeOwned>(&self, value: &Value) -> Result<T> {
        serde_yaml::from_value(value.clone()).map_err(|e| self.invalid(e))
    }

    fn text(&self, value: &Value) -> Result<String> {
        match scalar_text(value) {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(self.invalid("value must not be empty")),
            Err(reason) => Err(self.invalid(reason)),
        }
    }

    fn invalid(&self, reason: impl ToString) -> SwarmComposeError {
        SwarmComposeError::InvalidField {
            service: self.service.to_string(),
            field: self.field.to_string(),
            reason: reason.to_string(),
        }
    }

    fn unsupported(&self, reason: impl ToString) -> SwarmComposeError {
        SwarmComposeError::UnsupportedField {
            service: self.service.to_string(),
            field: self.field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A field that was skipped during translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Service name
    pub service: String,
    /// Field name
    pub field: String,
    /// Why the field was skipped
    pub reason: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported parameter {} in service {}: {}",
            self.field, self.service, self.reason
        )
    }
}

/// Result of translating one service
#[derive(Debug, Clone)]
pub struct Translation {
    /// The create command
    pub command: ServiceCreate,
    /// Skipped fields
    pub diagnostics: Vec<Diagnostic>,
}

/// Translate a resolved service definition into its create command
pub fn translate_service(project: &Project, service: &str) -> Result<Translation> {
    let definition = project.service(service)?;

    let mut flags = Vec::new();
    let mut image = None;
    let mut args = Vec::new();
    let mut diagnostics = Vec::new();

    for (key, value) in definition {
        let field = match key {
            Value::String(field) => field.as_str(),
            other => {
                return Err(SwarmComposeError::InvalidConfig(format!(
                    "Parameter names of service '{}' must be strings, found {:?}",
                    service, other
                )))
            }
        };

        let ctx = TranslationContext {
            service,
            field,
            project,
        };

        let result = match rule_for(field) {
            Some(rule) => rule(value, &ctx),
            None => Err(ctx.unsupported("unknown parameter")),
        };

        match result {
            Ok(tokens) => {
                for token in tokens {
                    match token {
                        CommandToken::Flag { name, value } => flags.push((name, value)),
                        CommandToken::Image(reference) => image = Some(reference),
                        CommandToken::Arg(arg) => args.push(arg),
                    }
                }
            }
            Err(SwarmComposeError::UnsupportedField {
                service,
                field,
                reason,
            }) => {
                tracing::warn!("Unsupported parameter {} in service {}: {}", field, service, reason);
                diagnostics.push(Diagnostic {
                    service,
                    field,
                    reason,
                });
            }
            Err(e) => return Err(e),
        }
    }

    let image = image.ok_or_else(|| SwarmComposeError::MissingImage(service.to_string()))?;

    Ok(Translation {
        command: ServiceCreate {
            name: project.context().prefix(service),
            flags,
            image,
            args,
        },
        diagnostics,
    })
}

fn restart(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    match ctx.text(value)?.as_str() {
        "always" => Ok(vec![CommandToken::flag("--restart-condition", "any")]),
        other => Err(ctx.unsupported(format!("restart policy '{}' has no swarm mapping", other))),
    }
}

fn logging(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: LoggingConfig = ctx.parse(value)?;

    let mut tokens = vec![CommandToken::flag(
        "--log-driver",
        config.driver.as_deref().unwrap_or(DEFAULT_LOG_DRIVER),
    )];

    if let Some(options) = &config.options {
        for (key, option) in mapping_pairs(options).map_err(|e| ctx.invalid(e))? {
            if let Some(option) = option {
                tokens.push(CommandToken::flag("--log-opt", format!("{}={}", key, option)));
            }
        }
    }

    Ok(tokens)
}

fn mem_limit(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    Ok(vec![CommandToken::flag("--limit-memory", ctx.text(value)?)])
}

fn image(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    Ok(vec![CommandToken::Image(ctx.text(value)?)])
}

fn command(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: CommandConfig = ctx.parse(value)?;
    Ok(config.tokens().into_iter().map(CommandToken::Arg).collect())
}

fn unsupported(_: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    Err(ctx.unsupported("not supported by swarm services"))
}

fn hostname(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    Ok(vec![CommandToken::flag("--hostname", ctx.text(value)?)])
}

fn healthcheck(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: HealthcheckConfig = ctx.parse(value)?;

    if config.disable == Some(true) {
        return Ok(vec![CommandToken::switch("--no-healthcheck")]);
    }

    let mut tokens = Vec::new();

    match &config.test {
        Some(HealthcheckTest::Array(test)) => match test.split_first() {
            Some((kind, rest)) if kind == "CMD" || kind == "CMD-SHELL" => {
                if !rest.is_empty() {
                    tokens.push(CommandToken::flag("--health-cmd", rest.join(" ")));
                }
            }
            Some((kind, _)) if kind == "NONE" => {
                tokens.push(CommandToken::switch("--no-healthcheck"));
            }
            Some((kind, _)) => {
                return Err(ctx.invalid(format!("unknown healthcheck test type '{}'", kind)))
            }
            None => {}
        },
        Some(HealthcheckTest::Command(test)) => {
            tokens.push(CommandToken::flag("--health-cmd", test));
        }
        None => {}
    }

    push_scalar(&mut tokens, "--health-interval", &config.interval);
    push_scalar(&mut tokens, "--health-retries", &config.retries);
    push_scalar(&mut tokens, "--health-timeout", &config.timeout);
    push_scalar(&mut tokens, "--health-start-period", &config.start_period);

    Ok(tokens)
}

fn labels(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: LabelsConfig = ctx.parse(value)?;
    Ok(config
        .tokens()
        .map_err(|e| ctx.invalid(e))?
        .into_iter()
        .map(|label| CommandToken::flag("--label", label))
        .collect())
}

fn deploy(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: DeployConfig = ctx.parse(value)?;
    let mut tokens = Vec::new();

    if let Some(mode) = &config.mode {
        tokens.push(CommandToken::flag("--mode", mode));
    }
    push_scalar(&mut tokens, "--replicas", &config.replicas);

    if let Some(constraints) = config.placement.as_ref().and_then(|p| p.constraints.as_ref()) {
        for constraint in constraints {
            tokens.push(CommandToken::flag("--constraint", constraint));
        }
    }

    if let Some(policy) = &config.restart_policy {
        if let Some(condition) = &policy.condition {
            tokens.push(CommandToken::flag("--restart-condition", condition));
        }
        push_scalar(&mut tokens, "--restart-delay", &policy.delay);
        push_scalar(&mut tokens, "--restart-max-attempts", &policy.max_attempts);
        push_scalar(&mut tokens, "--restart-window", &policy.window);
    }

    if let Some(update) = &config.update_config {
        push_scalar(&mut tokens, "--update-delay", &update.delay);
        if let Some(action) = &update.failure_action {
            tokens.push(CommandToken::flag("--update-failure-action", action));
        }
        push_scalar(&mut tokens, "--update-max-failure-ratio", &update.max_failure_ratio);
        push_scalar(&mut tokens, "--update-monitor", &update.monitor);
        push_scalar(&mut tokens, "--update-parallelism", &update.parallelism);
    }

    if let Some(endpoint_mode) = &config.endpoint_mode {
        tokens.push(CommandToken::flag("--endpoint-mode", endpoint_mode));
    }

    if let Some(resources) = &config.resources {
        if let Some(limits) = &resources.limits {
            push_scalar(&mut tokens, "--limit-cpu", &limits.cpus);
            push_scalar(&mut tokens, "--limit-memory", &limits.memory);
        }
        if let Some(reservations) = &resources.reservations {
            push_scalar(&mut tokens, "--reserve-cpu", &reservations.cpus);
            push_scalar(&mut tokens, "--reserve-memory", &reservations.memory);
        }
    }

    Ok(tokens)
}

fn ports(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: Vec<PortConfig> = ctx.parse(value)?;
    Ok(config
        .iter()
        .map(|port| CommandToken::flag("--publish", port))
        .collect())
}

fn networks(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: NetworksConfig = ctx.parse(value)?;

    config
        .names()
        .map_err(|e| ctx.invalid(e))?
        .into_iter()
        .map(|network| {
            let definition = ctx.project.network(&network).ok_or_else(|| {
                SwarmComposeError::UndefinedNetwork {
                    service: ctx.service.to_string(),
                    network: network.clone(),
                }
            })?;

            let name = match &definition.external {
                Some(external) if external.is_external() => {
                    external.name().unwrap_or(&network).to_string()
                }
                _ => ctx.project.context().prefix(&network),
            };

            Ok(CommandToken::flag("--network", name))
        })
        .collect()
}

fn volumes(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: Vec<VolumeMount> = ctx.parse(value)?;

    config
        .iter()
        .map(|mount| {
            let mount = match mount {
                VolumeMount::Short(spec) => short_mount(spec, ctx)?,
                VolumeMount::Long(spec) => long_mount(spec, ctx)?,
            };
            Ok(CommandToken::flag("--mount", mount))
        })
        .collect()
}

/// `--mount` value
#[derive(Debug, Clone, PartialEq, Eq)]
struct Mount {
    kind: &'static str,
    source: Option<String>,
    target: String,
    read_only: bool,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type={}", self.kind)?;
        if let Some(source) = &self.source {
            write!(f, ",src={}", source)?;
        }
        write!(f, ",dst={},readonly={}", self.target, self.read_only)
    }
}

fn short_mount(spec: &str, ctx: &TranslationContext<'_>) -> Result<Mount> {
    let mut parts = spec.split(':');
    let first = parts.next().unwrap_or_default();

    let Some(target) = parts.next() else {
        return Ok(Mount {
            kind: "volume",
            source: None,
            target: first.to_string(),
            read_only: false,
        });
    };

    let read_only = parts.next() == Some("ro");
    Ok(source_mount(first, target, read_only, ctx))
}

fn long_mount(spec: &VolumeMountLong, ctx: &TranslationContext<'_>) -> Result<Mount> {
    let read_only = spec.read_only.unwrap_or(false);

    match (spec.mount_type.as_deref(), spec.source.as_deref()) {
        (Some("tmpfs"), _) => Ok(Mount {
            kind: "tmpfs",
            source: None,
            target: spec.target.clone(),
            read_only,
        }),
        (Some("bind"), Some(source)) | (Some("volume") | None, Some(source)) => {
            Ok(source_mount(source, &spec.target, read_only, ctx))
        }
        (Some("volume") | None, None) => Ok(Mount {
            kind: "volume",
            source: None,
            target: spec.target.clone(),
            read_only,
        }),
        (Some(kind), _) => Err(ctx.unsupported(format!("mount type '{}'", kind))),
    }
}

/// Bind mount for paths, project-prefixed named volume otherwise
fn source_mount(source: &str, target: &str, read_only: bool, ctx: &TranslationContext<'_>) -> Mount {
    let context = ctx.project.context();

    let (kind, source) = if source.starts_with('.') {
        ("bind", resolve_relative(context.base_dir(), source))
    } else if source.starts_with('/') {
        ("bind", source.to_string())
    } else {
        ("volume", context.prefix(source))
    };

    Mount {
        kind,
        source: Some(source),
        target: target.to_string(),
        read_only,
    }
}

/// Join a relative path onto `base`, folding `.` and `..` lexically
fn resolve_relative(base: &Path, relative: &str) -> String {
    let mut resolved = PathBuf::new();
    for component in base.join(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved.display().to_string()
}

fn environment(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: EnvironmentConfig = ctx.parse(value)?;

    match config {
        EnvironmentConfig::Map(map) => Ok(mapping_pairs(&map)
            .map_err(|e| ctx.invalid(e))?
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => CommandToken::flag("--env", format!("{}={}", key, value)),
                None => CommandToken::flag("--env", key),
            })
            .collect()),
        EnvironmentConfig::Array(entries) => Ok(entries
            .into_iter()
            .map(|entry| {
                let placement = entry.starts_with("constraint:") || entry.starts_with("affinity:");
                match entry.split_once(':') {
                    Some((_, constraint)) if placement => {
                        CommandToken::flag("--constraint", constraint)
                    }
                    _ => CommandToken::flag("--env", &entry),
                }
            })
            .collect()),
    }
}

fn env_file(value: &Value, ctx: &TranslationContext<'_>) -> Result<Vec<CommandToken>> {
    let config: EnvFileConfig = ctx.parse(value)?;
    let mut tokens = Vec::new();

    for path in config.paths() {
        let path = ctx.project.context().base_dir().join(path);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ctx.invalid(format!("cannot read {}: {}", path.display(), e)))?;

        tokens.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| CommandToken::flag("--env", line)),
        );
    }

    Ok(tokens)
}

fn push_scalar(tokens: &mut Vec<CommandToken>, flag: &'static str, value: &Option<Scalar>) {
    if let Some(value) = value {
        tokens.push(CommandToken::flag(flag, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ProjectContext;
    use std::fs;
    use tempfile::tempdir;

    fn project_in(base_dir: &Path, yaml: &str) -> Project {
        Project::new(
            ProjectContext::new("myapp", base_dir),
            serde_yaml::from_str(yaml).unwrap(),
        )
        .unwrap()
    }

    fn project(yaml: &str) -> Project {
        project_in(Path::new("/srv/app/"), yaml)
    }

    fn translate(yaml: &str) -> Translation {
        translate_service(&project(yaml), "web").unwrap()
    }

    #[test]
    fn test_rule_table_has_no_duplicates() {
        for (i, (name, _)) in RULES.iter().enumerate() {
            assert!(RULES[i + 1..].iter().all(|(other, _)| other != name), "{}", name);
        }
    }

    #[test]
    fn test_image_command_and_name() {
        let translation = translate(
            r#"
services:
  web:
    image: nginx:1.25
    command: nginx  -g   "daemon off;"
"#,
        );
        let create = translation.command;
        assert_eq!(create.name, "myapp_web");
        assert_eq!(create.image, "nginx:1.25");
        assert_eq!(create.args, vec!["nginx", "-g", "\"daemon", "off;\""]);
    }

    #[test]
    fn test_command_list_is_kept() {
        let create = translate("services: {web: {image: a, command: [sh, -c, 'echo hi']}}").command;
        assert_eq!(create.args, vec!["sh", "-c", "echo hi"]);
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let err = translate_service(&project("services: {web: {hostname: x}}"), "web").unwrap_err();
        assert!(matches!(err, SwarmComposeError::MissingImage(name) if name == "web"));
    }

    #[test]
    fn test_unknown_and_unsupported_fields_are_diagnostics() {
        let translation = translate(
            r#"
services:
  web:
    image: a
    container_name: web1
    build: .
    restart: on-failure
    hostname: web
"#,
        );
        let fields: Vec<_> = translation
            .diagnostics
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert_eq!(fields, vec!["container_name", "build", "restart"]);
        assert_eq!(translation.command.flag_values("--hostname"), vec!["web"]);
        assert!(!translation.command.has_flag("--restart-condition"));
    }

    #[test]
    fn test_restart_always() {
        let create = translate("services: {web: {image: a, restart: always}}").command;
        assert_eq!(create.flag_values("--restart-condition"), vec!["any"]);
    }

    #[test]
    fn test_logging_defaults_driver_and_skips_null_options() {
        let create = translate(
            r#"
services:
  web:
    image: a
    logging:
      options:
        max-size: 10m
        tag:
        max-file: 3
"#,
        )
        .command;
        assert_eq!(create.flag_values("--log-driver"), vec!["json-file"]);
        assert_eq!(create.flag_values("--log-opt"), vec!["max-size=10m", "max-file=3"]);
    }

    #[test]
    fn test_healthcheck_cmd_and_interval() {
        let create = translate(
            r#"
services:
  web:
    image: a
    healthcheck:
      test: ["CMD", "curl", "-f", "http://x"]
      interval: 5s
"#,
        )
        .command;
        assert_eq!(create.flag_values("--health-cmd"), vec!["curl -f http://x"]);
        assert_eq!(create.flag_values("--health-interval"), vec!["5s"]);
    }

    #[test]
    fn test_healthcheck_disable_stops_translation() {
        let create = translate(
            "services: {web: {image: a, healthcheck: {disable: true, interval: 5s}}}",
        )
        .command;
        assert!(create.has_flag("--no-healthcheck"));
        assert!(!create.has_flag("--health-interval"));
    }

    #[test]
    fn test_healthcheck_none_and_retries() {
        let create = translate(
            "services: {web: {image: a, healthcheck: {test: [NONE], retries: 3, timeout: 2s}}}",
        )
        .command;
        assert!(create.has_flag("--no-healthcheck"));
        assert_eq!(create.flag_values("--health-retries"), vec!["3"]);
        assert_eq!(create.flag_values("--health-timeout"), vec!["2s"]);
    }

    #[test]
    fn test_labels_mapping_and_list() {
        let create = translate("services: {web: {image: a, labels: {tier: web, team: ops}}}").command;
        assert_eq!(create.flag_values("--label"), vec!["tier=web", "team=ops"]);

        let create = translate("services: {web: {image: a, labels: ['a=1', 'b=2']}}").command;
        assert_eq!(create.flag_values("--label"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_deploy_policy_flags_in_order() {
        let create = translate(
            r#"
services:
  web:
    image: a
    deploy:
      mode: replicated
      replicas: 2
      placement:
        constraints: [node.role == worker, node.labels.zone == a]
      restart_policy:
        condition: on-failure
        max_attempts: 3
      update_config:
        parallelism: 1
        max_failure_ratio: 0.2
        failure_action: rollback
"#,
        )
        .command;

        let flags: Vec<_> = create.flags.iter().map(|(flag, _)| *flag).collect();
        assert_eq!(
            flags,
            vec![
                "--mode",
                "--replicas",
                "--constraint",
                "--constraint",
                "--restart-condition",
                "--restart-max-attempts",
                "--update-failure-action",
                "--update-max-failure-ratio",
                "--update-parallelism",
            ]
        );
        assert_eq!(create.flag_values("--replicas"), vec!["2"]);
        assert_eq!(
            create.flag_values("--constraint"),
            vec!["node.role == worker", "node.labels.zone == a"]
        );
        assert_eq!(create.flag_values("--update-max-failure-ratio"), vec!["0.2"]);
    }

    #[test]
    fn test_ports_verbatim() {
        let create = translate("services: {web: {image: a, ports: ['80:80', 8443]}}").command;
        assert_eq!(create.flag_values("--publish"), vec!["80:80", "8443"]);
    }

    #[test]
    fn test_networks_prefix_unless_external() {
        let create = translate(
            r#"
services:
  web:
    image: a
    networks: [front, shared, legacy]
networks:
  front:
  shared:
    external: true
  legacy:
    external:
      name: old_net
"#,
        )
        .command;
        assert_eq!(
            create.flag_values("--network"),
            vec!["myapp_front", "shared", "old_net"]
        );
    }

    #[test]
    fn test_undefined_network_is_fatal() {
        let err = translate_service(
            &project("services: {web: {image: a, networks: {ghost: {}}}}"),
            "web",
        )
        .unwrap_err();
        assert!(matches!(err, SwarmComposeError::UndefinedNetwork { network, .. } if network == "ghost"));
    }

    #[test]
    fn test_relative_bind_mount() {
        let create = translate("services: {web: {image: a, volumes: ['./data:/var/lib/x:ro']}}").command;
        assert_eq!(
            create.flag_values("--mount"),
            vec!["type=bind,src=/srv/app/data,dst=/var/lib/x,readonly=true"]
        );
    }

    #[test]
    fn test_named_volume_mount() {
        let create = translate("services: {web: {image: a, volumes: ['cache:/tmp']}}").command;
        assert_eq!(
            create.flag_values("--mount"),
            vec!["type=volume,src=myapp_cache,dst=/tmp,readonly=false"]
        );
    }

    #[test]
    fn test_absolute_anonymous_and_long_mounts() {
        let create = translate(
            r#"
services:
  web:
    image: a
    volumes:
      - /etc/hosts:/etc/hosts:ro
      - /scratch
      - ../shared:/shared
      - type: volume
        source: data
        target: /data
        read_only: true
"#,
        )
        .command;
        assert_eq!(
            create.flag_values("--mount"),
            vec![
                "type=bind,src=/etc/hosts,dst=/etc/hosts,readonly=true",
                "type=volume,dst=/scratch,readonly=false",
                "type=bind,src=/srv/shared,dst=/shared,readonly=false",
                "type=volume,src=myapp_data,dst=/data,readonly=true",
            ]
        );
    }

    #[test]
    fn test_environment_mapping() {
        let create = translate("services: {web: {image: a, environment: {A: 1, B: x, C: null}}}").command;
        assert_eq!(create.flag_values("--env"), vec!["A=1", "B=x", "C"]);
    }

    #[test]
    fn test_environment_list_with_placement_tokens() {
        let create = translate(
            "services: {web: {image: a, environment: ['A=1', 'constraint:node==db1', 'affinity:image==~redis']}}",
        )
        .command;
        assert_eq!(create.flag_values("--env"), vec!["A=1"]);
        assert_eq!(
            create.flag_values("--constraint"),
            vec!["node==db1", "image==~redis"]
        );
    }

    #[test]
    fn test_env_file_skips_comments_and_blank_lines() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("app.env"),
            "# comment\nA=1\n\n  B=two  \n#C=3\n",
        )
        .unwrap();

        let project = project_in(
            temp.path(),
            "services: {web: {image: a, env_file: app.env}}",
        );
        let create = translate_service(&project, "web").unwrap().command;
        assert_eq!(create.flag_values("--env"), vec!["A=1", "B=two"]);
    }

    #[test]
    fn test_missing_env_file_is_fatal() {
        let temp = tempdir().unwrap();
        let project = project_in(temp.path(), "services: {web: {image: a, env_file: [nope.env]}}");
        assert!(matches!(
            translate_service(&project, "web"),
            Err(SwarmComposeError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_flags_follow_field_order() {
        let create = translate(
            "services: {web: {hostname: h, image: a, mem_limit: 1g, ports: ['80:80']}}",
        )
        .command;
        let flags: Vec<_> = create.flags.iter().map(|(flag, _)| *flag).collect();
        assert_eq!(flags, vec!["--hostname", "--limit-memory", "--publish"]);
    }
}
