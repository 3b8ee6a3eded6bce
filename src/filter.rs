//! Include/exclude filtering of the raw dependency graph

use crate::config::DependencyFilters;
use crate::provider::DependencyGraphProvider;
use crate::types::{Artifact, Dependency};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// A filter pattern compiled once when the configuration is loaded
///
/// An invalid expression is reported when compiled and then never matches.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Regex(Regex),
    Invalid(String),
}

impl CompiledPattern {
    /// Compile an optional pattern, blank patterns counting as absent
    pub fn compile(pattern: Option<&str>) -> Option<Self> {
        let pattern = pattern.map(str::trim).filter(|p| !p.is_empty())?;
        match Regex::new(pattern) {
            Ok(regex) => Some(Self::Regex(regex)),
            Err(e) => {
                warn!(
                    "The pattern specified by expression <{}> seems to be invalid: {}",
                    pattern, e
                );
                Some(Self::Invalid(pattern.to_string()))
            }
        }
    }

    /// Whether the pattern is found anywhere in the value
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(value),
            Self::Invalid(_) => false,
        }
    }
}

fn matches(pattern: &Option<CompiledPattern>, value: &str) -> bool {
    pattern
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

/// Dependency filters ready to be evaluated
#[derive(Debug, Clone)]
pub struct ArtifactFilters {
    included_groups: Option<CompiledPattern>,
    excluded_groups: Option<CompiledPattern>,
    included_artifacts: Option<CompiledPattern>,
    excluded_artifacts: Option<CompiledPattern>,
    included_scopes: Vec<String>,
    excluded_scopes: Vec<String>,
    included_types: Vec<String>,
    excluded_types: Vec<String>,
    include_optional: bool,
    include_transitive: bool,
    exclude_transitive_of_excluded: bool,
}

impl ArtifactFilters {
    pub fn compile(config: &DependencyFilters) -> Self {
        Self {
            included_groups: CompiledPattern::compile(config.included_groups.as_deref()),
            excluded_groups: CompiledPattern::compile(config.excluded_groups.as_deref()),
            included_artifacts: CompiledPattern::compile(config.included_artifacts.as_deref()),
            excluded_artifacts: CompiledPattern::compile(config.excluded_artifacts.as_deref()),
            included_scopes: config.included_scopes.clone(),
            excluded_scopes: config.excluded_scopes.clone(),
            included_types: config.included_types.clone(),
            excluded_types: config.excluded_types.clone(),
            include_optional: config.include_optional,
            include_transitive: config.include_transitive,
            exclude_transitive_of_excluded: config.exclude_transitive_of_excluded,
        }
    }

    /// Group/artifact inclusion: everything when no include pattern is set,
    /// otherwise a group OR artifact match
    fn is_included(&self, group_id: &str, artifact_id: &str) -> bool {
        if self.included_groups.is_none() && self.included_artifacts.is_none() {
            return true;
        }
        matches(&self.included_groups, group_id) || matches(&self.included_artifacts, artifact_id)
    }

    fn is_excluded(&self, group_id: &str, artifact_id: &str) -> bool {
        matches(&self.excluded_groups, group_id) || matches(&self.excluded_artifacts, artifact_id)
    }

    /// Whether an ancestor `groupId:artifactId` of the trail is excluded
    fn has_excluded_ancestor(&self, artifact: &Artifact) -> bool {
        artifact.trail.iter().any(|ga| {
            let (group_id, artifact_id) = ga.split_once(':').unwrap_or((ga.as_str(), ""));
            self.is_excluded(group_id, artifact_id)
        })
    }

    /// Whether an artifact is kept
    pub fn accepts(&self, artifact: &Artifact) -> bool {
        let coordinates = &artifact.coordinates;

        if !self.include_transitive && !artifact.direct {
            return false;
        }
        if self.excluded_scopes.contains(&artifact.scope) {
            return false;
        }
        if !self.included_scopes.is_empty() && !self.included_scopes.contains(&artifact.scope) {
            return false;
        }
        if self.excluded_types.contains(&coordinates.kind) {
            return false;
        }
        if !self.included_types.is_empty() && !self.included_types.contains(&coordinates.kind) {
            return false;
        }
        if artifact.optional && !self.include_optional {
            return false;
        }
        if !self.is_included(&coordinates.group_id, &coordinates.artifact_id) {
            return false;
        }
        if self.is_excluded(&coordinates.group_id, &coordinates.artifact_id) {
            return false;
        }
        if self.exclude_transitive_of_excluded && self.has_excluded_ancestor(artifact) {
            debug!("Excluding {}: pulled in by an excluded dependency", artifact.id());
            return false;
        }
        true
    }

    /// Filter raw artifacts, keyed by identity; the first artifact of a key wins
    pub fn filter(&self, artifacts: &[Artifact]) -> BTreeMap<String, Artifact> {
        let mut result = BTreeMap::new();
        for artifact in artifacts.iter().filter(|a| self.accepts(a)) {
            result
                .entry(artifact.id())
                .or_insert_with(|| artifact.clone());
        }
        result
    }
}

/// Resolved dependencies kept across invocations, by identity key
pub type DependencyCache = HashMap<String, Dependency>;

/// Load the filtered dependency set of a project
///
/// Each retained artifact is resolved through the provider unless already
/// cached. A dependency that cannot be resolved is reported and left out.
pub fn load_dependencies<P: DependencyGraphProvider + ?Sized>(
    provider: &P,
    filters: &ArtifactFilters,
    cache: &mut DependencyCache,
) -> crate::error::Result<BTreeMap<String, Dependency>> {
    let artifacts = provider.artifacts()?;
    let mut result = BTreeMap::new();

    for (id, artifact) in filters.filter(&artifacts) {
        if let Some(cached) = cache.get(&id) {
            debug!("Dependency {} already loaded", id);
            result.insert(id, cached.clone());
            continue;
        }
        match provider.resolve(&artifact) {
            Ok(dependency) => {
                cache.insert(id.clone(), dependency.clone());
                result.insert(id, dependency);
            }
            Err(e) => {
                warn!("Unable to obtain metadata for {}, skipping it: {}", id, e);
            }
        }
    }

    debug!("{} dependencies retained", result.len());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{GraphNode, StaticGraph};
    use crate::types::Coordinates;

    fn artifact(group: &str, name: &str) -> Artifact {
        Artifact::new(Coordinates::new(group, name, "1.0"))
    }

    fn filters(configure: impl FnOnce(&mut DependencyFilters)) -> ArtifactFilters {
        let mut config = DependencyFilters::default();
        configure(&mut config);
        ArtifactFilters::compile(&config)
    }

    #[test]
    fn test_no_include_pattern_keeps_everything() {
        let f = filters(|_| {});
        assert!(f.accepts(&artifact("org.example", "a")));
    }

    #[test]
    fn test_include_uses_find_semantics() {
        let f = filters(|c| c.included_groups = Some("foo".to_string()));
        assert!(f.accepts(&artifact("barfoobaz", "a")));
        assert!(!f.accepts(&artifact("org.example", "a")));
    }

    #[test]
    fn test_group_or_artifact_include() {
        let f = filters(|c| {
            c.included_groups = Some("^org\\.keep$".to_string());
            c.included_artifacts = Some("^wanted$".to_string());
        });
        assert!(f.accepts(&artifact("org.keep", "x")));
        assert!(f.accepts(&artifact("org.other", "wanted")));
        assert!(!f.accepts(&artifact("org.other", "x")));
    }

    #[test]
    fn test_exclude_applies_after_include() {
        let f = filters(|c| {
            c.included_groups = Some("org".to_string());
            c.excluded_artifacts = Some("internal".to_string());
        });
        assert!(f.accepts(&artifact("org.example", "public")));
        assert!(!f.accepts(&artifact("org.example", "internal-api")));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let f = filters(|c| {
            c.included_groups = Some("([".to_string());
            c.excluded_artifacts = Some("(".to_string());
        });
        // include configured but invalid: nothing is included
        assert!(!f.accepts(&artifact("org.example", "a")));

        let f = filters(|c| c.excluded_groups = Some("[".to_string()));
        // exclude invalid: nothing is excluded
        assert!(f.accepts(&artifact("org.example", "a")));
    }

    #[test]
    fn test_system_scope_excluded_by_default() {
        let f = filters(|_| {});
        let mut a = artifact("org.example", "a");
        a.scope = "system".to_string();
        assert!(!f.accepts(&a));
    }

    #[test]
    fn test_scope_type_and_optional_filters() {
        let f = filters(|c| {
            c.included_scopes = vec!["compile".to_string()];
            c.excluded_types = vec!["pom".to_string()];
            c.include_optional = false;
        });
        let mut test_scoped = artifact("g", "t");
        test_scoped.scope = "test".to_string();
        let pom = Artifact::new(Coordinates::new("g", "p", "1").with_kind("pom"));
        let mut optional = artifact("g", "o");
        optional.optional = true;

        assert!(!f.accepts(&test_scoped));
        assert!(!f.accepts(&pom));
        assert!(!f.accepts(&optional));
        assert!(f.accepts(&artifact("g", "ok")));
    }

    #[test]
    fn test_direct_only_when_transitive_disabled() {
        let f = filters(|c| c.include_transitive = false);
        let mut transitive = artifact("g", "t");
        transitive.direct = false;
        assert!(!f.accepts(&transitive));
        assert!(f.accepts(&artifact("g", "d")));
    }

    #[test]
    fn test_transitive_of_excluded() {
        let mut child = artifact("org.example", "child");
        child.direct = false;
        child.trail = vec!["org.internal:parent".to_string()];

        let keep = filters(|c| c.excluded_groups = Some("org\\.internal".to_string()));
        assert!(keep.accepts(&child));

        let drop = filters(|c| {
            c.excluded_groups = Some("org\\.internal".to_string());
            c.exclude_transitive_of_excluded = true;
        });
        assert!(!drop.accepts(&child));
    }

    #[test]
    fn test_filter_keeps_first_of_same_identity() {
        let f = filters(|_| {});
        let first = artifact("g", "a");
        let mut second = artifact("g", "a");
        second.scope = "runtime".to_string();

        let filtered = f.filter(&[first, second]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["g--a--1.0"].scope, "compile");
    }

    #[test]
    fn test_load_dependencies_skips_unresolvable_and_caches() {
        let graph = StaticGraph::new("demo")
            .with_node(GraphNode::new(Coordinates::new("g", "ok", "1")).license("MIT"))
            .with_node(GraphNode::new(Coordinates::new("g", "broken", "1")).failing("no pom"));
        let f = filters(|_| {});
        let mut cache = DependencyCache::new();

        let loaded = load_dependencies(&graph, &f, &mut cache).unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["g--ok--1"]);
        assert!(cache.contains_key("g--ok--1"));
        assert!(!cache.contains_key("g--broken--1"));

        let again = load_dependencies(&graph, &f, &mut cache).unwrap();
        assert_eq!(again, loaded);
    }
}
