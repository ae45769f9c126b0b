//! Swarm service lifecycle orchestrator
//!
//! Each operation observes the cluster first and only issues the commands
//! needed to reach the requested state. Commands run one after another,
//! except image pulls which fan out per node.

use super::cluster::{parse_nodes, ClusterState, ServiceState};
use super::command::ControlCommand;
use super::runner::{CommandOutput, CommandRunner};
use super::translate::{translate_service, Diagnostic};
use crate::compose::config::mapping_pairs;
use crate::compose::Project;
use crate::error::{Result, SwarmComposeError};
use serde_yaml::Mapping;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default engine port used to reach individual nodes
pub const DEFAULT_NODE_PORT: u16 = 2375;

/// Whether commands are executed or only printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run every command
    #[default]
    Execute,
    /// Print every command, run nothing
    DryRun,
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Docker binary
    pub docker: String,
    /// Engine port on swarm nodes, used by `pull`
    pub node_port: u16,
    /// Maximum number of nodes pulling at once
    pub pull_concurrency: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            node_port: DEFAULT_NODE_PORT,
            pull_concurrency: num_cpus::get(),
        }
    }
}

/// Drives a compose project onto a swarm cluster
pub struct SwarmOrchestrator {
    project: Arc<Project>,
    runner: Arc<dyn CommandRunner>,
    mode: ExecutionMode,
    options: OrchestratorOptions,
    diagnostics: Vec<Diagnostic>,
}

impl SwarmOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        project: Arc<Project>,
        runner: Arc<dyn CommandRunner>,
        mode: ExecutionMode,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            project,
            runner,
            mode,
            options,
            diagnostics: Vec::new(),
        }
    }

    /// Fields skipped while translating services
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Create missing networks, volumes and services, then scale them
    pub async fn up(&mut self, services: &[String]) -> Result<()> {
        let selected = self.project.select_services(services)?;
        tracing::info!("Bringing up project: {}", self.project.context().name());

        let state = self.cluster_state().await?;
        self.create_networks(&state).await?;
        self.create_volumes(&state).await?;

        for service in &selected {
            let name = self.project.context().prefix(service);
            if state.service(&name).exists() {
                tracing::debug!("Service {} already exists", name);
                continue;
            }

            let translation = translate_service(&self.project, service)?;
            self.diagnostics.extend(translation.diagnostics);
            self.execute(&ControlCommand::CreateService(translation.command), false)
                .await?;
        }

        self.scale(&selected).await
    }

    /// Scale services to their declared replica counts
    pub async fn start(&mut self, services: &[String]) -> Result<()> {
        let selected = self.project.select_services(services)?;
        self.scale(&selected).await
    }

    /// Scale running services to zero replicas
    pub async fn stop(&mut self, services: &[String]) -> Result<()> {
        let selected = self.project.select_services(services)?;
        let state = self.cluster_state().await?;

        let mut targets = Vec::new();
        for service in &selected {
            let name = self.project.context().prefix(service);
            match state.service(&name) {
                ServiceState::Absent => continue,
                ServiceState::Exists {
                    replicas: Some(0),
                } => {
                    tracing::debug!("Service {} is already stopped", name);
                    continue;
                }
                _ => {}
            }
            if self.project.is_global(service)? {
                tracing::debug!("Skipping global service {}", name);
                continue;
            }
            targets.push((name, 0));
        }

        if targets.is_empty() {
            return Ok(());
        }
        self.execute(&ControlCommand::Scale(targets), false).await?;
        Ok(())
    }

    /// Remove existing services
    pub async fn remove(&mut self, services: &[String]) -> Result<()> {
        let selected = self.project.select_services(services)?;
        let state = self.cluster_state().await?;

        let targets: Vec<String> = selected
            .iter()
            .map(|service| self.project.context().prefix(service))
            .filter(|name| state.service(name) != ServiceState::Absent)
            .collect();

        if targets.is_empty() {
            return Ok(());
        }
        self.execute(&ControlCommand::Remove(targets), false).await?;
        Ok(())
    }

    /// Pull service images on every ready node
    pub async fn pull(&mut self, services: &[String]) -> Result<()> {
        let selected = self.project.select_services(services)?;

        let mut images: Vec<String> = Vec::new();
        for service in &selected {
            let image = self.project.image(service)?;
            if !images.contains(&image) {
                images.push(image);
            }
        }
        if images.is_empty() {
            return Ok(());
        }

        let nodes = match self.execute(&ControlCommand::ListNodes, false).await? {
            Some(output) => parse_nodes(&output.stdout)?,
            None => Vec::new(),
        };

        let semaphore = Arc::new(Semaphore::new(self.options.pull_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for node in nodes {
            if !node.is_ready() {
                tracing::debug!("Skipping node {} ({:?})", node.hostname, node.state);
                continue;
            }

            let command = ControlCommand::PullOnNode {
                node: node.hostname.clone(),
                port: self.options.node_port,
                images: images.clone(),
            };
            let runner = Arc::clone(&self.runner);
            let semaphore = Arc::clone(&semaphore);
            let mode = self.mode;
            let docker = self.options.docker.clone();
            let count = images.len();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                tracing::info!("Pulling {} image(s) on {}", count, node.hostname);
                match execute(runner.as_ref(), mode, &docker, &command, true).await {
                    Ok(Some(output)) if !output.success() => {
                        Err(format!("{}: {}", node.hostname, output.combined()))
                    }
                    Ok(_) => Ok(()),
                    Err(e) => Err(format!("{}: {}", node.hostname, e)),
                }
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => {
                    tracing::error!("Pull failed on {}", failure);
                    failures.push(failure);
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort();
            Err(SwarmComposeError::PullFailed(failures))
        }
    }

    async fn create_networks(&self, state: &ClusterState) -> Result<()> {
        for (network, config) in self.project.networks() {
            if config.external.as_ref().is_some_and(|e| e.is_external()) {
                tracing::debug!("Network {} is external", network);
                continue;
            }

            let name = self.project.context().prefix(network);
            if state.has_network(&name) {
                continue;
            }
            let options = driver_options(config.driver_opts.as_ref(), "network", network)?;
            self.execute(
                &ControlCommand::CreateNetwork {
                    name,
                    driver: config.driver.clone(),
                    options,
                },
                false,
            )
            .await?;
        }
        Ok(())
    }

    async fn create_volumes(&self, state: &ClusterState) -> Result<()> {
        for (volume, config) in self.project.volumes() {
            if config.external.as_ref().is_some_and(|e| e.is_external()) {
                tracing::debug!("Volume {} is external", volume);
                continue;
            }

            let name = self.project.context().prefix(volume);
            if state.has_volume(&name) {
                continue;
            }

            let options = driver_options(config.driver_opts.as_ref(), "volume", volume)?;

            self.execute(
                &ControlCommand::CreateVolume {
                    name,
                    driver: config.driver.clone(),
                    options,
                },
                false,
            )
            .await?;
        }
        Ok(())
    }

    /// One batched scale to the declared replica counts
    async fn scale(&self, services: &[String]) -> Result<()> {
        let mut targets = Vec::new();
        for service in services {
            let name = self.project.context().prefix(service);
            if self.project.is_global(service)? {
                tracing::debug!("Skipping global service {}", name);
                continue;
            }
            targets.push((name, self.project.replicas(service)?));
        }

        if targets.is_empty() {
            return Ok(());
        }
        self.execute(&ControlCommand::Scale(targets), false).await?;
        Ok(())
    }

    async fn cluster_state(&self) -> Result<ClusterState> {
        let services = self.execute(&ControlCommand::ListServices, true).await?;
        let networks = self.execute(&ControlCommand::ListNetworks, true).await?;
        let volumes = self.execute(&ControlCommand::ListVolumes, true).await?;

        match (services, networks, volumes) {
            (Some(services), Some(networks), Some(volumes)) => ClusterState::from_listings(
                &listing(&services),
                &listing(&networks),
                &listing(&volumes),
            ),
            _ => Ok(ClusterState::unobserved()),
        }
    }

    async fn execute(
        &self,
        command: &ControlCommand,
        allow_failure: bool,
    ) -> Result<Option<CommandOutput>> {
        execute(
            self.runner.as_ref(),
            self.mode,
            &self.options.docker,
            command,
            allow_failure,
        )
        .await
    }
}

/// Run or print one command
///
/// Returns `None` in dry-run mode. A non-zero exit is an error unless
/// `allow_failure` is set, in which case the output is returned as is.
pub async fn execute(
    runner: &dyn CommandRunner,
    mode: ExecutionMode,
    docker: &str,
    command: &ControlCommand,
    allow_failure: bool,
) -> Result<Option<CommandOutput>> {
    let invocation = command.invocation(docker);

    if mode == ExecutionMode::DryRun {
        println!("{}", invocation);
        return Ok(None);
    }

    if command.is_probe() {
        tracing::debug!("Running: {}", invocation);
    } else {
        tracing::info!("Running: {}", invocation);
    }

    let output = runner.run(&invocation).await?;
    if !output.success() && !allow_failure {
        return Err(SwarmComposeError::ExternalCommandFailure {
            command: invocation.to_string(),
            code: output.status,
            output: output.combined(),
        });
    }
    Ok(Some(output))
}

/// `driver_opts` as `key=value` pairs
fn driver_options(
    opts: Option<&Mapping>,
    kind: &str,
    name: &str,
) -> Result<Vec<(String, String)>> {
    let Some(opts) = opts else {
        return Ok(Vec::new());
    };
    Ok(mapping_pairs(opts)
        .map_err(|reason| {
            SwarmComposeError::InvalidConfig(format!(
                "driver_opts of {} '{}': {}",
                kind, name, reason
            ))
        })?
        .into_iter()
        .map(|(key, value)| (key, value.unwrap_or_default()))
        .collect())
}

/// Rows of a probe, empty when the probe failed
fn listing(output: &CommandOutput) -> String {
    if output.success() {
        output.stdout.clone()
    } else {
        tracing::warn!("Cluster probe failed: {}", output.combined());
        String::new()
    }
}
