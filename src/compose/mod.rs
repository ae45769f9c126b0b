//! Compose document handling
//!
//! Compose files are parsed into untyped YAML documents, merged in order,
//! and have their `extends` references resolved into a [`Project`].

pub mod config;
pub mod extends;
pub mod merge;
pub mod parser;
pub mod project;

pub use extends::{DocumentSource, ExtendsResolver};
pub use merge::{merge, merge_all, ConflictResolver, EnvironmentMerge};
pub use parser::ComposeParser;
pub use project::{Project, ProjectContext};
