//! Docker Swarm service orchestration
//!
//! Translates compose services into `docker service` commands and drives
//! them against a swarm manager.

pub mod cluster;
pub mod command;
pub mod node;
pub mod orchestrator;
pub mod runner;
pub mod translate;

pub use cluster::{ClusterState, ServiceState};
pub use command::{CommandToken, ControlCommand, Invocation, ServiceCreate};
pub use node::{Node, NodeState};
pub use orchestrator::{ExecutionMode, OrchestratorOptions, SwarmOrchestrator};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use translate::{translate_service, Diagnostic, Translation};
