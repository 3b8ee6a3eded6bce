//! Dependency graph read from a TOML or JSON manifest

use super::DependencyGraphProvider;
use crate::error::{LicenseError, Result};
use crate::types::{Artifact, Coordinates, DeclaredLicense, Dependency};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One node of a static graph with its licensing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(flatten)]
    pub artifact: Artifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub licenses: Vec<DeclaredLicense>,
    /// Resolving this node fails with this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_error: Option<String>,
}

impl GraphNode {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            artifact: Artifact::new(coordinates),
            name: None,
            url: None,
            licenses: Vec::new(),
            resolution_error: None,
        }
    }

    pub fn license(mut self, name: impl Into<String>) -> Self {
        self.licenses.push(DeclaredLicense::named(name));
        self
    }

    pub fn license_url(mut self, url: impl Into<String>) -> Self {
        self.licenses.push(DeclaredLicense::url_only(url));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.artifact.scope = scope.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.artifact.optional = true;
        self
    }

    /// Mark as transitive, reached through the given `groupId:artifactId` trail
    pub fn through(mut self, trail: &[&str]) -> Self {
        self.artifact.direct = false;
        self.artifact.trail = trail.iter().map(|ga| ga.to_string()).collect();
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.resolution_error = Some(message.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct GraphManifest {
    #[serde(default = "default_project_name")]
    name: String,
    #[serde(default)]
    dependencies: Vec<GraphNode>,
}

fn default_project_name() -> String {
    "project".to_string()
}

/// In-memory dependency graph
///
/// ```toml
/// name = "demo"
///
/// [[dependencies]]
/// group_id = "org.example"
/// artifact_id = "a"
/// version = "1.0"
/// licenses = [{ name = "MIT" }]
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticGraph {
    name: String,
    nodes: Vec<GraphNode>,
}

impl StaticGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: GraphNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: GraphManifest = toml::from_str(content)?;
        Ok(Self {
            name: manifest.name,
            nodes: manifest.dependencies,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let manifest: GraphManifest = serde_json::from_str(content)?;
        Ok(Self {
            name: manifest.name,
            nodes: manifest.dependencies,
        })
    }

    /// Load a manifest, JSON when the extension is `.json`, TOML otherwise
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| LicenseError::file(path, e))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }
}

impl DependencyGraphProvider for StaticGraph {
    fn project_name(&self) -> &str {
        &self.name
    }

    fn artifacts(&self) -> Result<Vec<Artifact>> {
        Ok(self.nodes.iter().map(|node| node.artifact.clone()).collect())
    }

    fn resolve(&self, artifact: &Artifact) -> Result<Dependency> {
        let id = artifact.id();
        let node = self
            .nodes
            .iter()
            .find(|node| node.artifact.id() == id)
            .ok_or_else(|| LicenseError::resolution(&id, "not part of the graph"))?;

        if let Some(message) = &node.resolution_error {
            return Err(LicenseError::resolution(id, message.clone()));
        }

        let mut dependency = Dependency::from_artifact(artifact, node.licenses.clone());
        dependency.name = node.name.clone();
        dependency.url = node.url.clone();
        Ok(dependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_manifest() {
        let graph = StaticGraph::from_toml_str(
            r#"
            name = "demo"

            [[dependencies]]
            group_id = "org.example"
            artifact_id = "a"
            version = "1.0"
            name = "Library A"
            licenses = [{ name = "MIT" }, { url = "https://example.org/l" }]

            [[dependencies]]
            group_id = "org.example"
            artifact_id = "b"
            version = "2.0"
            type = "zip"
            scope = "test"
            direct = false
            trail = ["org.example:a"]
            "#,
        )
        .unwrap();

        assert_eq!(graph.project_name(), "demo");
        let artifacts = graph.artifacts().unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[0].direct);
        assert_eq!(artifacts[0].scope, "compile");
        assert_eq!(artifacts[1].id(), "org.example--b--2.0--zip");
        assert!(!artifacts[1].direct);

        let a = graph.resolve(&artifacts[0]).unwrap();
        assert_eq!(a.display_name(), "Library A");
        assert_eq!(a.licenses.len(), 2);
        assert_eq!(a.licenses[1].key(), Some("https://example.org/l"));
    }

    #[test]
    fn test_json_manifest() {
        let graph = StaticGraph::from_json_str(
            r#"{"name":"demo","dependencies":[{"group_id":"g","artifact_id":"a","version":"1","licenses":[]}]}"#,
        )
        .unwrap();
        assert_eq!(graph.nodes().len(), 1);
        assert!(graph.resolve(&graph.artifacts().unwrap()[0]).unwrap().licenses.is_empty());
    }

    #[test]
    fn test_failing_node() {
        let graph = StaticGraph::new("demo")
            .with_node(GraphNode::new(Coordinates::new("g", "a", "1")).failing("boom"));
        let artifact = graph.artifacts().unwrap().remove(0);
        assert!(matches!(
            graph.resolve(&artifact),
            Err(LicenseError::ResolutionError { .. })
        ));
    }
}
