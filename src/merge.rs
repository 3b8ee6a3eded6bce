//! Collapsing of equivalent license names into one canonical bucket

use crate::license_map::LicenseMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One merge group: a canonical license name and its aliases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    pub canonical: String,
    pub aliases: Vec<String>,
}

/// Validated merge groups
///
/// No name is both an alias and a canonical name, and no alias belongs to two
/// groups, so applying the groups twice gives the same map as applying them
/// once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeGroups {
    groups: Vec<MergeGroup>,
    canonical_of: BTreeMap<String, String>,
}

/// Split one `canonical|alias|alias` entry into trimmed, non-empty names
fn split_group(entry: &str) -> Vec<String> {
    entry
        .split('|')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

impl MergeGroups {
    /// Parse configured merge entries, each `canonical|alias|alias`
    ///
    /// Groups sharing a canonical name are combined. An alias already merged
    /// into another license is reported and ignored.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut canonical_of: BTreeMap<String, String> = BTreeMap::new();
        let mut order: Vec<String> = Vec::new();

        for entry in entries {
            let names = split_group(entry.as_ref());
            let Some((head, aliases)) = names.split_first() else {
                continue;
            };

            let canonical = resolve(&canonical_of, head);
            if canonical != *head {
                warn!(
                    "License {} is itself merged into {}, merging its group there",
                    head, canonical
                );
            }
            if !order.contains(&canonical) {
                order.push(canonical.clone());
            }

            for alias in aliases {
                let alias_root = resolve(&canonical_of, alias);
                if alias_root == canonical {
                    continue;
                }
                if let Some(owner) = canonical_of.get(alias) {
                    warn!(
                        "License {} is already merged into {}, ignoring merge into {}",
                        alias, owner, canonical
                    );
                    continue;
                }
                canonical_of.insert(alias.clone(), canonical.clone());
                order.retain(|name| name != alias);
            }
        }

        let groups = order
            .into_iter()
            .map(|canonical| {
                let aliases = canonical_of
                    .keys()
                    .filter(|alias| resolve(&canonical_of, alias) == canonical)
                    .cloned()
                    .collect();
                MergeGroup { canonical, aliases }
            })
            .collect::<Vec<_>>();

        let canonical_of = canonical_of
            .keys()
            .map(|alias| (alias.clone(), resolve(&canonical_of, alias)))
            .collect();

        Self {
            groups,
            canonical_of,
        }
    }

    /// Parse configured entries followed by the lines of a remote list,
    /// one group per line, `#` starting a comment
    pub fn parse_with_list<S: AsRef<str>>(entries: &[S], list: Option<&str>) -> Self {
        let mut all: Vec<&str> = entries.iter().map(|entry| entry.as_ref()).collect();
        if let Some(list) = list {
            all.extend(
                list.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#')),
            );
        }
        Self::parse(&all)
    }

    pub fn groups(&self) -> &[MergeGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Canonical name for a license, the name itself when not an alias
    pub fn canonical_name<'a>(&'a self, license: &'a str) -> &'a str {
        self.canonical_of
            .get(license)
            .map(String::as_str)
            .unwrap_or(license)
    }

    /// Apply every group to the map
    pub fn apply(&self, map: &mut LicenseMap) {
        for group in &self.groups {
            merge_group(map, group);
        }
    }
}

fn resolve(canonical_of: &BTreeMap<String, String>, name: &str) -> String {
    let mut current = name;
    while let Some(next) = canonical_of.get(current) {
        current = next;
    }
    current.to_string()
}

fn merge_group(map: &mut LicenseMap, group: &MergeGroup) {
    if map.create_bucket(&group.canonical) {
        warn!("No license [{}] found, will create it", group.canonical);
    }

    for alias in &group.aliases {
        match map.remove_bucket(alias) {
            Some(dependencies) => {
                debug!(
                    "Merging {} dependencies of [{}] into [{}]",
                    dependencies.len(),
                    alias,
                    group.canonical
                );
                for dependency in dependencies {
                    map.put(&group.canonical, dependency);
                }
            }
            None => {
                warn!(
                    "No license [{}] found, skip the merge to [{}]",
                    alias, group.canonical
                );
            }
        }
    }
}

/// Merge license aliases of the map into their canonical names
pub fn merge_licenses(map: &mut LicenseMap, groups: &MergeGroups) {
    groups.apply(map);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinates, DeclaredLicense, Dependency};

    fn dep(artifact: &str, licenses: &[&str]) -> Dependency {
        Dependency::new(
            Coordinates::new("org.example", artifact, "1.0"),
            licenses.iter().map(|l| DeclaredLicense::named(*l)).collect(),
        )
    }

    #[test]
    fn test_alias_collapses_into_canonical() {
        let a = dep("a", &["Apache-2.0"]);
        let b = dep("b", &["Apache Software License"]);
        let mut map = LicenseMap::from_dependencies([&a, &b]);

        let groups = MergeGroups::parse(&["Apache-2.0 | Apache Software License"]);
        merge_licenses(&mut map, &groups);

        assert!(!map.contains_license("Apache Software License"));
        assert_eq!(map.get("Apache-2.0").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_canonical_is_created() {
        let b = dep("b", &["ASL"]);
        let mut map = LicenseMap::from_dependencies([&b]);
        merge_licenses(&mut map, &MergeGroups::parse(&["Apache-2.0|ASL"]));
        assert_eq!(map.licenses_of(&b), vec!["Apache-2.0"]);
    }

    #[test]
    fn test_missing_alias_is_a_noop() {
        let a = dep("a", &["MIT"]);
        let mut map = LicenseMap::from_dependencies([&a]);
        merge_licenses(&mut map, &MergeGroups::parse(&["MIT|Expat"]));
        assert_eq!(map.license_names().collect::<Vec<_>>(), vec!["MIT"]);
    }

    #[test]
    fn test_merge_twice_is_idempotent() {
        let a = dep("a", &["ASL"]);
        let b = dep("b", &["The Apache License"]);
        let mut map = LicenseMap::from_dependencies([&a, &b]);
        let groups = MergeGroups::parse(&["Apache-2.0|ASL", "ASL|The Apache License"]);

        merge_licenses(&mut map, &groups);
        let once = map.clone();
        merge_licenses(&mut map, &groups);

        assert_eq!(map, once);
        assert_eq!(map.license_names().collect::<Vec<_>>(), vec!["Apache-2.0"]);
    }

    #[test]
    fn test_groups_with_same_canonical_are_combined() {
        let groups = MergeGroups::parse(&["MIT|Expat", "MIT|MIT License"]);
        assert_eq!(groups.groups().len(), 1);
        assert_eq!(groups.groups()[0].aliases, vec!["Expat", "MIT License"]);
    }

    #[test]
    fn test_alias_claimed_twice_is_ignored() {
        let groups = MergeGroups::parse(&["MIT|Expat", "BSD|Expat"]);
        assert_eq!(groups.canonical_name("Expat"), "MIT");
        let bsd = groups
            .groups()
            .iter()
            .find(|g| g.canonical == "BSD")
            .unwrap();
        assert!(bsd.aliases.is_empty());
    }

    #[test]
    fn test_canonical_declared_later_as_alias_is_folded() {
        let groups = MergeGroups::parse(&["ASL|The Apache License", "Apache-2.0|ASL"]);
        assert_eq!(groups.groups().len(), 1);
        assert_eq!(groups.canonical_name("The Apache License"), "Apache-2.0");
        assert_eq!(groups.canonical_name("ASL"), "Apache-2.0");
        assert_eq!(groups.canonical_name("MIT"), "MIT");
    }

    #[test]
    fn test_remote_list_skips_comments() {
        let groups = MergeGroups::parse_with_list(
            &["Apache-2.0|ASL"],
            Some("# merges\n\nMIT|Expat\n  # more\nBSD|BSD-3\n"),
        );
        assert_eq!(groups.groups().len(), 3);
        assert_eq!(groups.canonical_name("Expat"), "MIT");
    }

    #[test]
    fn test_merge_keeps_every_dependency() {
        let a = dep("a", &["ASL", "MIT"]);
        let b = dep("b", &[]);
        let mut map = LicenseMap::from_dependencies([&a, &b]);
        let before: Vec<String> = map.dependencies().iter().map(|d| d.id().to_string()).collect();

        merge_licenses(&mut map, &MergeGroups::parse(&["Apache-2.0|ASL|MIT"]));
        let after: Vec<String> = map.dependencies().iter().map(|d| d.id().to_string()).collect();

        assert_eq!(before, after);
    }
}
