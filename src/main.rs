//! swarm-compose - run docker-compose projects on Docker Swarm
//!
//! This is the main CLI entry point for swarm-compose.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use swarm_compose::compose::ProjectContext;
use swarm_compose::config::{Environment, Settings};
use swarm_compose::error::Result;
use swarm_compose::swarm::orchestrator::DEFAULT_NODE_PORT;
use swarm_compose::swarm::{ExecutionMode, OrchestratorOptions, ProcessRunner, SwarmOrchestrator};
use tracing_subscriber::EnvFilter;

/// swarm-compose - docker-compose for Docker Swarm
#[derive(Parser)]
#[command(name = "swarm-compose")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Run docker-compose projects as Docker Swarm services", long_about = None)]
struct Cli {
    /// Compose file (can be given multiple times)
    #[arg(short, long = "file")]
    file: Vec<PathBuf>,

    /// Project name
    #[arg(short, long)]
    project_name: Option<String>,

    /// Print commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Docker binary
    #[arg(long, global = true, env = "SWARM_COMPOSE_DOCKER", default_value = "docker")]
    docker: String,

    /// Engine port on swarm nodes, used by pull
    #[arg(long, global = true, default_value_t = DEFAULT_NODE_PORT)]
    node_port: u16,

    /// Maximum number of nodes pulling at once (default: number of CPUs)
    #[arg(long, global = true)]
    pull_concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start services
    Up {
        /// Detached mode (always on, accepted for compatibility)
        #[arg(short, long)]
        detach: bool,
        /// Services to bring up
        services: Vec<String>,
    },

    /// Scale services to their declared replicas
    Start {
        /// Services to start
        services: Vec<String>,
    },

    /// Scale services to zero replicas
    Stop {
        /// Services to stop
        services: Vec<String>,
    },

    /// Remove services
    #[command(name = "rm")]
    Remove {
        /// Don't ask for confirmation (accepted for compatibility)
        #[arg(short = 'f', long)]
        force: bool,
        /// Services to remove
        services: Vec<String>,
    },

    /// Pull service images on every ready node
    Pull {
        /// Services whose images to pull
        services: Vec<String>,
    },

    /// Print the resolved compose document
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let env = Environment::load(&cwd)?;
    let settings = Settings::resolve(&cli.file, cli.project_name.as_deref(), &env, &cwd)?;
    tracing::debug!(
        "Project {} from {:?}",
        settings.project_name,
        settings.files
    );

    let context = ProjectContext::new(settings.project_name.clone(), settings.base_dir.clone());
    let project = Arc::new(env.parser().load_project(&settings.files, context)?);

    let mode = if cli.dry_run {
        ExecutionMode::DryRun
    } else {
        ExecutionMode::Execute
    };

    let mut options = OrchestratorOptions {
        docker: cli.docker,
        node_port: cli.node_port,
        ..Default::default()
    };
    if let Some(concurrency) = cli.pull_concurrency {
        options.pull_concurrency = concurrency;
    }

    let mut orchestrator =
        SwarmOrchestrator::new(Arc::clone(&project), Arc::new(ProcessRunner), mode, options);

    match cli.command {
        Commands::Up { services, detach } => {
            if !detach {
                tracing::debug!("Swarm services always run detached");
            }
            orchestrator.up(&services).await?
        }
        Commands::Start { services } => orchestrator.start(&services).await?,
        Commands::Stop { services } => orchestrator.stop(&services).await?,
        Commands::Remove { services, force } => {
            tracing::debug!("Removing services (force: {})", force);
            orchestrator.remove(&services).await?
        }
        Commands::Pull { services } => orchestrator.pull(&services).await?,
        Commands::Config => {
            print!("{}", serde_yaml::to_string(project.document())?);
        }
    }

    if !orchestrator.diagnostics().is_empty() {
        tracing::info!(
            "{} parameter(s) were skipped",
            orchestrator.diagnostics().len()
        );
    }

    Ok(())
}
