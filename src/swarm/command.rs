//! Normalized control-plane commands
//!
//! Everything the orchestrator asks of the cluster is described by a
//! [`ControlCommand`]. Rendering it into an argv [`Invocation`] is the only
//! place that knows about the docker CLI's spelling of each operation.

use std::fmt;

/// Driver of project networks that do not name one
pub const DEFAULT_NETWORK_DRIVER: &str = "overlay";

/// One token produced by a translation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandToken {
    /// A `--flag [value]` pair
    Flag {
        /// Flag name, including the leading dashes
        name: &'static str,
        /// Flag value; `None` for switches
        value: Option<String>,
    },
    /// The service image
    Image(String),
    /// A trailing command argument
    Arg(String),
}

impl CommandToken {
    /// Flag with a value
    pub fn flag(name: &'static str, value: impl ToString) -> Self {
        CommandToken::Flag {
            name,
            value: Some(value.to_string()),
        }
    }

    /// Flag without a value
    pub fn switch(name: &'static str) -> Self {
        CommandToken::Flag { name, value: None }
    }
}

/// `docker service create` for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCreate {
    /// Project-prefixed service name
    pub name: String,
    /// Flags in field order
    pub flags: Vec<(&'static str, Option<String>)>,
    /// Image reference
    pub image: String,
    /// Command arguments
    pub args: Vec<String>,
}

impl ServiceCreate {
    /// Values passed to a given flag, in order
    pub fn flag_values(&self, name: &str) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|(flag, _)| *flag == name)
            .filter_map(|(_, value)| value.as_deref())
            .collect()
    }

    /// Whether a flag is present at all
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|(flag, _)| *flag == name)
    }
}

/// A single control-plane operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Create a service
    CreateService(ServiceCreate),
    /// Create an encrypted network
    CreateNetwork {
        /// Project-prefixed network name
        name: String,
        /// Network driver; overlay when unset
        driver: Option<String>,
        /// Driver options
        options: Vec<(String, String)>,
    },
    /// Create a volume
    CreateVolume {
        /// Project-prefixed volume name
        name: String,
        /// Volume driver
        driver: Option<String>,
        /// Driver options
        options: Vec<(String, String)>,
    },
    /// Scale services to the given replica counts
    Scale(Vec<(String, u64)>),
    /// Remove services
    Remove(Vec<String>),
    /// List services
    ListServices,
    /// List networks
    ListNetworks,
    /// List volumes
    ListVolumes,
    /// List swarm nodes
    ListNodes,
    /// Pull images on one node through its engine API
    PullOnNode {
        /// Node hostname
        node: String,
        /// Engine port on the node
        port: u16,
        /// Images to pull
        images: Vec<String>,
    },
}

impl ControlCommand {
    /// Whether the command only reads cluster state
    pub fn is_probe(&self) -> bool {
        matches!(
            self,
            ControlCommand::ListServices
                | ControlCommand::ListNetworks
                | ControlCommand::ListVolumes
                | ControlCommand::ListNodes
        )
    }

    /// Render the command for the given docker binary
    pub fn invocation(&self, docker: &str) -> Invocation {
        let args: Vec<String> = match self {
            ControlCommand::CreateService(create) => {
                let mut args = strings(&[
                    "service",
                    "create",
                    "--with-registry-auth",
                    "--name",
                    create.name.as_str(),
                ]);
                for (flag, value) in &create.flags {
                    args.push(flag.to_string());
                    if let Some(value) = value {
                        args.push(value.clone());
                    }
                }
                args.push(create.image.clone());
                args.extend(create.args.iter().cloned());
                args
            }
            ControlCommand::CreateNetwork {
                name,
                driver,
                options,
            } => {
                let mut args = strings(&[
                    "network",
                    "create",
                    "--driver",
                    driver.as_deref().unwrap_or(DEFAULT_NETWORK_DRIVER),
                    "--opt",
                    "encrypted",
                ]);
                for (key, value) in options {
                    args.push("--opt".to_string());
                    args.push(format!("{}={}", key, value));
                }
                args.push(name.clone());
                args
            }
            ControlCommand::CreateVolume {
                name,
                driver,
                options,
            } => {
                let mut args = strings(&["volume", "create", "--name", name.as_str()]);
                if let Some(driver) = driver {
                    args.push(format!("--driver={}", driver));
                }
                for (key, value) in options {
                    args.push("--opt".to_string());
                    args.push(format!("{}={}", key, value));
                }
                args
            }
            ControlCommand::Scale(targets) => {
                let mut args = strings(&["service", "scale"]);
                args.extend(
                    targets
                        .iter()
                        .map(|(name, replicas)| format!("{}={}", name, replicas)),
                );
                args
            }
            ControlCommand::Remove(names) => {
                let mut args = strings(&["service", "rm"]);
                args.extend(names.iter().cloned());
                args
            }
            ControlCommand::ListServices => strings(&["service", "ls", "--format", "{{json .}}"]),
            ControlCommand::ListNetworks => strings(&["network", "ls", "--format", "{{json .}}"]),
            ControlCommand::ListVolumes => strings(&["volume", "ls", "--format", "{{json .}}"]),
            ControlCommand::ListNodes => strings(&["node", "ls", "--format", "{{json .}}"]),
            ControlCommand::PullOnNode { node, port, images } => {
                // Every image is attempted; the exit status reports any failure.
                let mut script = vec!["status=0".to_string()];
                script.extend(images.iter().map(|image| {
                    format!(
                        "{} -H tcp://{}:{} pull {} || status=1",
                        shell_quote(docker),
                        shell_quote(node),
                        port,
                        shell_quote(image)
                    )
                }));
                script.push("exit $status".to_string());
                return Invocation::new("sh", vec!["-c".to_string(), script.join("; ")]);
            }
        };

        Invocation::new(docker, args)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A program and its argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
}

impl Invocation {
    /// Create an invocation
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote a word for a POSIX shell, leaving plain words untouched
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '@' | '%' | '+')
        });

    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_create_invocation_order() {
        let create = ServiceCreate {
            name: "app_web".to_string(),
            flags: vec![
                ("--hostname", Some("web".to_string())),
                ("--no-healthcheck", None),
            ],
            image: "nginx".to_string(),
            args: vec!["nginx".to_string(), "-g".to_string()],
        };

        let invocation = ControlCommand::CreateService(create).invocation("docker");
        assert_eq!(invocation.program, "docker");
        assert_eq!(
            invocation.args,
            vec![
                "service",
                "create",
                "--with-registry-auth",
                "--name",
                "app_web",
                "--hostname",
                "web",
                "--no-healthcheck",
                "nginx",
                "nginx",
                "-g"
            ]
        );
    }

    #[test]
    fn test_volume_create_with_driver_options() {
        let invocation = ControlCommand::CreateVolume {
            name: "app_data".to_string(),
            driver: Some("local".to_string()),
            options: vec![("type".to_string(), "nfs".to_string())],
        }
        .invocation("docker");
        assert_eq!(
            invocation.to_string(),
            "docker volume create --name app_data --driver=local --opt type=nfs"
        );
    }

    #[test]
    fn test_network_create_defaults_to_overlay() {
        let plain = ControlCommand::CreateNetwork {
            name: "app_front".to_string(),
            driver: None,
            options: Vec::new(),
        }
        .invocation("docker");
        assert_eq!(
            plain.to_string(),
            "docker network create --driver overlay --opt encrypted app_front"
        );

        let custom = ControlCommand::CreateNetwork {
            name: "app_back".to_string(),
            driver: Some("weave".to_string()),
            options: vec![("mtu".to_string(), "1400".to_string())],
        }
        .invocation("docker");
        assert_eq!(
            custom.to_string(),
            "docker network create --driver weave --opt encrypted --opt mtu=1400 app_back"
        );
    }

    #[test]
    fn test_pull_is_one_composite_command() {
        let invocation = ControlCommand::PullOnNode {
            node: "node-1".to_string(),
            port: 2375,
            images: vec!["nginx:1".to_string(), "redis".to_string()],
        }
        .invocation("docker");
        assert_eq!(invocation.program, "sh");
        assert_eq!(
            invocation.args[1],
            "status=0; docker -H tcp://node-1:2375 pull nginx:1 || status=1; \
             docker -H tcp://node-1:2375 pull redis || status=1; exit $status"
        );
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain-word"), "plain-word");
        assert_eq!(shell_quote("curl -f http://x"), "'curl -f http://x'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("{{json .}}"), "'{{json .}}'");
    }
}
