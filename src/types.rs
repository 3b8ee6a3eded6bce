//! Core data types: dependency coordinates, identities and reports

use crate::license_map::LicenseMap;
use crate::policy::ForbiddenCheck;
use crate::resolver::MissingFileUpdate;
use crate::whitelist::WhitelistCheck;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Name of the bucket holding dependencies with no resolvable license
pub const UNKNOWN_LICENSE: &str = "Unknown license";

/// Scope whose dependencies never carry meaningful licensing information
pub const SYSTEM_SCOPE: &str = "system";

/// Default scope of a dependency when the provider does not say otherwise
pub const DEFAULT_SCOPE: &str = "compile";

/// Default artifact type
pub const DEFAULT_TYPE: &str = "jar";

/// Separator used inside canonical identity keys
pub const ID_SEPARATOR: &str = "--";

fn default_type() -> String {
    DEFAULT_TYPE.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_direct() -> bool {
    true
}

/// Coordinates of an artifact in a dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    /// Artifact type (`jar`, `pom`, `crate`, ...)
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl Coordinates {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            kind: default_type(),
            classifier: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Canonical identity key: `groupId--artifactId--version[--type][--classifier]`
    ///
    /// The type is omitted for the `jar` and `pom` defaults, the classifier
    /// when absent.
    pub fn id(&self) -> String {
        let mut id = self.gav_key();
        if !self.kind.is_empty() && self.kind != "jar" && self.kind != "pom" {
            id.push_str(ID_SEPARATOR);
            id.push_str(&self.kind);
        }
        if let Some(classifier) = self.classifier.as_deref().filter(|c| !c.is_empty()) {
            id.push_str(ID_SEPARATOR);
            id.push_str(classifier);
        }
        id
    }

    /// `groupId--artifactId--version`, the key used by the dependency allow-list
    pub fn gav_key(&self) -> String {
        [
            self.group_id.as_str(),
            self.artifact_id.as_str(),
            self.version.as_str(),
        ]
        .join(ID_SEPARATOR)
    }

    /// `groupId:artifactId`
    pub fn ga(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// A license as declared by a dependency's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredLicense {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DeclaredLicense {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: None,
        }
    }

    pub fn url_only(url: impl Into<String>) -> Self {
        Self {
            name: None,
            url: Some(url.into()),
        }
    }

    /// Bucket key for this license: its name, else its url
    pub fn key(&self) -> Option<&str> {
        non_empty(self.name.as_deref()).or_else(|| non_empty(self.url.as_deref()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A raw node of the dependency graph, before its metadata is resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(flatten)]
    pub coordinates: Coordinates,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub optional: bool,
    /// Declared by the project itself rather than pulled in transitively
    #[serde(default = "default_direct")]
    pub direct: bool,
    /// `groupId:artifactId` of every ancestor between the project and this node
    #[serde(default)]
    pub trail: Vec<String>,
}

impl Artifact {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            scope: default_scope(),
            optional: false,
            direct: true,
            trail: Vec::new(),
        }
    }

    pub fn id(&self) -> String {
        self.coordinates.id()
    }
}

/// A resolved dependency: coordinates plus the metadata used for licensing
///
/// Equality and ordering only consider the canonical identity key, so two
/// dependency values with the same key are the same dependency for every
/// license map operation.
#[derive(Debug, Clone, Serialize)]
pub struct Dependency {
    id: String,
    pub coordinates: Coordinates,
    pub scope: String,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub licenses: Vec<DeclaredLicense>,
}

impl Dependency {
    pub fn new(coordinates: Coordinates, licenses: Vec<DeclaredLicense>) -> Self {
        Self {
            id: coordinates.id(),
            coordinates,
            scope: default_scope(),
            optional: false,
            name: None,
            url: None,
            licenses,
        }
    }

    /// Build a dependency from a graph node and its resolved metadata
    pub fn from_artifact(artifact: &Artifact, licenses: Vec<DeclaredLicense>) -> Self {
        let mut dependency = Self::new(artifact.coordinates.clone(), licenses);
        dependency.scope = artifact.scope.clone();
        dependency.optional = artifact.optional;
        dependency
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Canonical identity key
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable name, falling back to the artifact id
    pub fn display_name(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(&self.coordinates.artifact_id)
    }

    pub fn is_system_scoped(&self) -> bool {
        self.scope == SYSTEM_SCOPE
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Dependency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dependency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Complete result of one license resolution run
#[derive(Debug, Clone, Serialize)]
pub struct ThirdPartyReport {
    /// Name of the project (or aggregate) the report covers
    pub project_name: String,
    /// Timestamp when the report was produced
    pub timestamp: DateTime<Utc>,
    /// License name -> dependencies carrying it
    pub licenses: LicenseMap,
    /// Dependencies still without any license after resolution
    pub unsafe_dependencies: Vec<Dependency>,
    /// Outcome of the allow/deny license check
    pub forbidden: ForbiddenCheck,
    /// Outcome of the dependency allow-list check, when configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<WhitelistCheck>,
    /// Missing-file content and whether it must be rewritten
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_file: Option<MissingFileUpdate>,
    /// Summary statistics
    pub summary: ReportSummary,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_dependencies: usize,
    pub license_count: usize,
    pub unsafe_count: usize,
    pub forbidden_license_count: usize,
    pub unlisted_count: usize,
}

impl ThirdPartyReport {
    /// Create a report for a fully processed license map
    pub fn new(project_name: String, licenses: LicenseMap, forbidden: ForbiddenCheck) -> Self {
        let mut report = Self {
            project_name,
            timestamp: Utc::now(),
            unsafe_dependencies: licenses.unsafe_dependencies(),
            licenses,
            forbidden,
            whitelist: None,
            missing_file: None,
            summary: ReportSummary::default(),
        };
        report.compute_summary();
        report
    }

    /// Whether any dependency is left without a license
    pub fn has_missing_licenses(&self) -> bool {
        !self.unsafe_dependencies.is_empty()
    }

    /// Whether a forbidden or non-allowed license is in use
    pub fn has_forbidden_licenses(&self) -> bool {
        !self.forbidden.safe
    }

    /// Whether a dependency is missing from the dependency allow-list
    pub fn has_unlisted_dependencies(&self) -> bool {
        self.whitelist
            .as_ref()
            .is_some_and(|check| !check.unlisted.is_empty())
    }

    /// Compute summary statistics from the report content
    pub fn compute_summary(&mut self) {
        self.summary = ReportSummary {
            total_dependencies: self.licenses.dependency_count(),
            license_count: crate::report::license_count(&self.licenses),
            unsafe_count: self.unsafe_dependencies.len(),
            forbidden_license_count: self.forbidden.unsafe_licenses().len(),
            unlisted_count: self
                .whitelist
                .as_ref()
                .map(|check| check.unlisted.len())
                .unwrap_or(0),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_omits_default_type() {
        let jar = Coordinates::new("org.example", "foo", "1.0");
        assert_eq!(jar.id(), "org.example--foo--1.0");
        let pom = jar.clone().with_kind("pom");
        assert_eq!(pom.id(), "org.example--foo--1.0");
    }

    #[test]
    fn test_id_keeps_type_and_classifier() {
        let coords = Coordinates::new("org.example", "foo", "1.0")
            .with_kind("zip")
            .with_classifier("dist");
        assert_eq!(coords.id(), "org.example--foo--1.0--zip--dist");
        assert_eq!(coords.gav_key(), "org.example--foo--1.0");
        assert_eq!(coords.ga(), "org.example:foo");
    }

    #[test]
    fn test_dependency_identity_ignores_metadata() {
        let coords = Coordinates::new("g", "a", "1");
        let left = Dependency::new(coords.clone(), vec![DeclaredLicense::named("MIT")]);
        let right = Dependency::new(coords, Vec::new()).with_name("Other name");
        assert_eq!(left, right);
        assert_eq!(left.cmp(&right), Ordering::Equal);
    }

    #[test]
    fn test_license_key_falls_back_to_url() {
        assert_eq!(DeclaredLicense::named("MIT").key(), Some("MIT"));
        let url = DeclaredLicense {
            name: Some("  ".to_string()),
            url: Some("https://example.org/l".to_string()),
        };
        assert_eq!(url.key(), Some("https://example.org/l"));
        assert_eq!(DeclaredLicense::default().key(), None);
    }

    #[test]
    fn test_display_name_falls_back_to_artifact_id() {
        let dep = Dependency::new(Coordinates::new("g", "artifact", "1"), Vec::new());
        assert_eq!(dep.display_name(), "artifact");
        assert_eq!(dep.with_name("Pretty").display_name(), "Pretty");
    }
}
