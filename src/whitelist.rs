//! Dependency allow-list

use crate::config::{Severity, WhitelistConfig};
use crate::error::{LicenseError, Result};
use crate::types::{Dependency, ID_SEPARATOR};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, warn};

#[derive(Debug, Clone)]
enum VersionMatcher {
    Any,
    Pattern(Regex),
    Invalid,
}

impl VersionMatcher {
    fn compile(artifact: &str, pattern: Option<&str>) -> Self {
        let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) else {
            return Self::Any;
        };
        match Regex::new(&format!("^(?:{})$", pattern)) {
            Ok(regex) => Self::Pattern(regex),
            Err(e) => {
                warn!(
                    "Invalid version pattern <{}> for {} in the allow-list: {}",
                    pattern, artifact, e
                );
                Self::Invalid
            }
        }
    }

    fn matches(&self, version: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern(regex) => regex.is_match(version),
            Self::Invalid => false,
        }
    }
}

/// Outcome of the allow-list check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhitelistCheck {
    /// `groupId--artifactId--version` of every dependency not allowed
    pub unlisted: BTreeSet<String>,
    pub severity: Severity,
}

/// Allowed dependencies: `groupId:artifactId` -> accepted versions
#[derive(Debug, Clone)]
pub struct DependencyWhitelist {
    entries: BTreeMap<String, Vec<VersionMatcher>>,
    severity: Severity,
}

impl DependencyWhitelist {
    /// Build the allow-list; a coordinate without 2 or 3 tokens is an error
    pub fn from_config(config: &WhitelistConfig) -> Result<Self> {
        let mut entries: BTreeMap<String, Vec<VersionMatcher>> = BTreeMap::new();

        for (artifact, versions) in &config.artifacts {
            let matchers = entries.entry(artifact.clone()).or_default();
            if versions.is_empty() {
                matchers.push(VersionMatcher::Any);
            }
            for entry in versions {
                matchers.push(VersionMatcher::compile(artifact, entry.version.as_deref()));
            }
        }

        for coordinate in &config.coordinates {
            let tokens: Vec<&str> = coordinate.split(':').collect();
            if !(2..=3).contains(&tokens.len()) {
                return Err(LicenseError::InvalidCoordinate {
                    coordinate: coordinate.clone(),
                    tokens: tokens.len(),
                });
            }
            let artifact = format!("{}:{}", tokens[0], tokens[1]);
            let matcher = VersionMatcher::compile(&artifact, tokens.get(2).copied());
            entries.entry(artifact).or_default().push(matcher);
        }

        Ok(Self {
            entries,
            severity: config.severity,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a `groupId--artifactId--version` key is allowed
    pub fn allows(&self, gav: &str, version: &str) -> bool {
        let Some(artifact) = artifact_key(gav, version) else {
            return false;
        };
        self.entries
            .get(&artifact)
            .is_some_and(|matchers| matchers.iter().any(|m| m.matches(version)))
    }

    /// Check every dependency, reporting those not allowed
    pub fn check<'a>(&self, dependencies: impl IntoIterator<Item = &'a Dependency>) -> WhitelistCheck {
        let unlisted: BTreeSet<String> = dependencies
            .into_iter()
            .filter(|d| !self.allows(&d.coordinates.gav_key(), &d.coordinates.version))
            .map(|d| d.coordinates.gav_key())
            .collect();

        for gav in &unlisted {
            match self.severity {
                Severity::Error => error!("Dependency {} is not in the allow-list", gav),
                Severity::Warning => warn!("Dependency {} is not in the allow-list", gav),
            }
        }

        WhitelistCheck {
            unlisted,
            severity: self.severity,
        }
    }
}

/// `groupId:artifactId` from `groupId--artifactId--version`
fn artifact_key(gav: &str, version: &str) -> Option<String> {
    let ga = gav.strip_suffix(version)?.strip_suffix(ID_SEPARATOR)?;
    Some(ga.replacen(ID_SEPARATOR, ":", 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WhitelistEntry;
    use crate::types::Coordinates;

    fn dep(group: &str, artifact: &str, version: &str) -> Dependency {
        Dependency::new(Coordinates::new(group, artifact, version), Vec::new())
    }

    fn config(artifacts: Vec<(&str, Vec<Option<&str>>)>, coordinates: &[&str]) -> WhitelistConfig {
        WhitelistConfig {
            artifacts: artifacts
                .into_iter()
                .map(|(key, versions)| {
                    (
                        key.to_string(),
                        versions
                            .into_iter()
                            .map(|v| WhitelistEntry {
                                version: v.map(String::from),
                            })
                            .collect(),
                    )
                })
                .collect(),
            coordinates: coordinates.iter().map(|c| c.to_string()).collect(),
            severity: Severity::Error,
        }
    }

    #[test]
    fn test_artifact_key() {
        assert_eq!(
            artifact_key("org.example--lib-core--1.2", "1.2").as_deref(),
            Some("org.example:lib-core")
        );
        assert_eq!(artifact_key("g--a--1", "2"), None);
    }

    #[test]
    fn test_unset_version_matches_any() {
        let whitelist = DependencyWhitelist::from_config(&config(vec![("g:a", vec![None])], &[])).unwrap();
        assert!(whitelist.allows("g--a--1.0", "1.0"));
        assert!(whitelist.allows("g--a--9", "9"));
        assert!(!whitelist.allows("g--b--1.0", "1.0"));
    }

    #[test]
    fn test_version_pattern() {
        let whitelist =
            DependencyWhitelist::from_config(&config(vec![("g:a", vec![Some("1\\..*")])], &[])).unwrap();
        assert!(whitelist.allows("g--a--1.4", "1.4"));
        assert!(!whitelist.allows("g--a--2.0", "2.0"));
        // the whole version has to match
        assert!(!whitelist.allows("g--a--21.0", "21.0"));
    }

    #[test]
    fn test_invalid_version_pattern_never_matches() {
        let whitelist =
            DependencyWhitelist::from_config(&config(vec![("g:a", vec![Some("(")])], &[])).unwrap();
        assert!(!whitelist.allows("g--a--1.0", "1.0"));
    }

    #[test]
    fn test_coordinate_strings() {
        let whitelist =
            DependencyWhitelist::from_config(&config(Vec::new(), &["g:a", "g:b:2\\..*"])).unwrap();
        assert!(whitelist.allows("g--a--7", "7"));
        assert!(whitelist.allows("g--b--2.1", "2.1"));
        assert!(!whitelist.allows("g--b--3.0", "3.0"));
    }

    #[test]
    fn test_bad_coordinate_is_fatal() {
        let result = DependencyWhitelist::from_config(&config(Vec::new(), &["just-one-token"]));
        assert!(matches!(
            result,
            Err(LicenseError::InvalidCoordinate { tokens: 1, .. })
        ));
        assert!(DependencyWhitelist::from_config(&config(Vec::new(), &["a:b:c:d"])).is_err());
    }

    #[test]
    fn test_check_collects_unlisted() {
        let whitelist = DependencyWhitelist::from_config(&config(vec![("g:a", vec![None])], &[])).unwrap();
        let deps = [dep("g", "a", "1"), dep("g", "b", "1")];
        let check = whitelist.check(deps.iter());

        assert_eq!(check.unlisted.into_iter().collect::<Vec<_>>(), vec!["g--b--1"]);
        assert_eq!(check.severity, Severity::Error);
    }
}
