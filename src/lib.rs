//! swarm-compose - run docker-compose projects on Docker Swarm
//!
//! swarm-compose reads one or more compose files and drives a swarm
//! cluster through the docker CLI:
//!
//! - Ordered merging of compose files and `extends` resolution
//! - Translation of service definitions into `docker service create`
//! - Idempotent up, start, stop and rm of project services
//! - Parallel image pulls on every ready node

pub mod compose;
pub mod config;
pub mod error;
pub mod swarm;

pub use error::{Result, SwarmComposeError};
