//! Dependency graph providers

pub mod cargo;
pub mod manifest;

pub use cargo::CargoGraph;
pub use manifest::{GraphNode, StaticGraph};

use crate::error::Result;
use crate::types::{Artifact, Dependency};

/// Source of the raw dependency graph of one project
pub trait DependencyGraphProvider {
    /// Name of the project the graph belongs to
    fn project_name(&self) -> &str;

    /// Every node of the graph except the project itself, direct and transitive
    fn artifacts(&self) -> Result<Vec<Artifact>>;

    /// Resolve the licensing metadata of one node
    fn resolve(&self, artifact: &Artifact) -> Result<Dependency>;
}
