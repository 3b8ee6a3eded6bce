//! License name -> dependency set association

use crate::types::{DeclaredLicense, Dependency, UNKNOWN_LICENSE};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Ordered mapping from license name to the dependencies carrying it
///
/// The map keeps one invariant on every mutation: a dependency is either in
/// the [`UNKNOWN_LICENSE`] bucket or in at least one real license bucket,
/// never both. Buckets are ordered by license name and dependencies inside a
/// bucket by their identity key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LicenseMap {
    buckets: BTreeMap<String, BTreeSet<Dependency>>,
}

impl LicenseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from resolved dependencies using their declared licenses
    pub fn from_dependencies<'a>(dependencies: impl IntoIterator<Item = &'a Dependency>) -> Self {
        let mut map = Self::new();
        for dependency in dependencies {
            map.add_dependency(dependency);
        }
        map
    }

    /// Add a dependency under each of its declared licenses
    pub fn add_dependency(&mut self, dependency: &Dependency) {
        self.add_license(dependency, &dependency.licenses);
    }

    /// Add a dependency under the given licenses
    ///
    /// System scoped dependencies are skipped. A dependency with no license
    /// goes to the unknown bucket. A license without name is keyed by its url,
    /// and one with neither is treated as unknown.
    pub fn add_license(&mut self, dependency: &Dependency, licenses: &[DeclaredLicense]) {
        if dependency.is_system_scoped() {
            debug!("Skipping system scoped dependency {}", dependency);
            return;
        }

        if licenses.is_empty() {
            self.put(UNKNOWN_LICENSE, dependency.clone());
            return;
        }

        for license in licenses {
            let has_name = license
                .name
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty());
            match license.key() {
                Some(key) => {
                    if !has_name {
                        warn!(
                            "No license name defined for {}, using url {} instead",
                            dependency, key
                        );
                    }
                    self.put(key, dependency.clone());
                }
                None => {
                    warn!(
                        "No license name nor url defined for {}, treating it as unknown",
                        dependency
                    );
                    self.put(UNKNOWN_LICENSE, dependency.clone());
                }
            }
        }
    }

    /// Insert a dependency into a bucket, keeping the unknown bucket exclusive
    ///
    /// Putting into a real license removes the dependency from the unknown
    /// bucket. Putting into the unknown bucket is ignored when the dependency
    /// already has a real license.
    pub fn put(&mut self, license: &str, dependency: Dependency) {
        if license == UNKNOWN_LICENSE {
            if self.has_real_license(&dependency) {
                return;
            }
        } else {
            self.remove_from_unknown(&dependency);
        }
        self.buckets
            .entry(license.to_string())
            .or_default()
            .insert(dependency);
    }

    /// Give an unknown dependency a real license
    pub fn promote(&mut self, dependency: &Dependency, license: &str) {
        let dependency = self
            .unknown()
            .and_then(|bucket| bucket.get(dependency))
            .cloned()
            .unwrap_or_else(|| dependency.clone());
        self.put(license, dependency);
    }

    fn remove_from_unknown(&mut self, dependency: &Dependency) {
        if let Some(bucket) = self.buckets.get_mut(UNKNOWN_LICENSE) {
            bucket.remove(dependency);
            if bucket.is_empty() {
                self.buckets.remove(UNKNOWN_LICENSE);
            }
        }
    }

    fn has_real_license(&self, dependency: &Dependency) -> bool {
        self.buckets
            .iter()
            .any(|(name, bucket)| name != UNKNOWN_LICENSE && bucket.contains(dependency))
    }

    /// Create an empty bucket unless it exists; returns whether it was created
    pub fn create_bucket(&mut self, license: &str) -> bool {
        if self.buckets.contains_key(license) {
            return false;
        }
        self.buckets.insert(license.to_string(), BTreeSet::new());
        true
    }

    /// Remove a whole bucket
    pub fn remove_bucket(&mut self, license: &str) -> Option<BTreeSet<Dependency>> {
        self.buckets.remove(license)
    }

    /// Remove one dependency from one bucket, keeping the bucket itself
    pub fn remove_from_bucket(&mut self, license: &str, dependency: &Dependency) -> bool {
        self.buckets
            .get_mut(license)
            .is_some_and(|bucket| bucket.remove(dependency))
    }

    /// Remove a dependency from every bucket, returning the names it was under
    pub fn remove_dependency(&mut self, dependency: &Dependency) -> Vec<String> {
        let mut removed = Vec::new();
        for (name, bucket) in self.buckets.iter_mut() {
            if bucket.remove(dependency) {
                removed.push(name.clone());
            }
        }
        if self
            .buckets
            .get(UNKNOWN_LICENSE)
            .is_some_and(BTreeSet::is_empty)
        {
            self.buckets.remove(UNKNOWN_LICENSE);
        }
        removed
    }

    /// Union another map into this one
    ///
    /// A dependency ends up unknown only if no side gives it a real license,
    /// so the result does not depend on the order maps are combined in.
    pub fn union(&mut self, other: &LicenseMap) {
        for (name, bucket) in &other.buckets {
            if name != UNKNOWN_LICENSE {
                self.buckets.entry(name.clone()).or_default();
            }
            for dependency in bucket {
                self.put(name, dependency.clone());
            }
        }
    }

    pub fn get(&self, license: &str) -> Option<&BTreeSet<Dependency>> {
        self.buckets.get(license)
    }

    pub fn contains_license(&self, license: &str) -> bool {
        self.buckets.contains_key(license)
    }

    /// Dependencies in the unknown bucket
    pub fn unknown(&self) -> Option<&BTreeSet<Dependency>> {
        self.buckets.get(UNKNOWN_LICENSE)
    }

    /// Dependencies without any resolvable license
    pub fn unsafe_dependencies(&self) -> Vec<Dependency> {
        self.unknown()
            .map(|bucket| bucket.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn license_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<Dependency>)> {
        self.buckets
            .iter()
            .map(|(name, bucket)| (name.as_str(), bucket))
    }

    /// Every dependency of the map, once
    pub fn dependencies(&self) -> BTreeSet<&Dependency> {
        self.buckets.values().flatten().collect()
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies().len()
    }

    /// Licenses a dependency is listed under
    pub fn licenses_of(&self, dependency: &Dependency) -> Vec<&str> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| bucket.contains(dependency))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Dependency -> sorted license names
    pub fn to_dependency_map(&self) -> BTreeMap<Dependency, Vec<String>> {
        let mut result: BTreeMap<Dependency, Vec<String>> = BTreeMap::new();
        for (name, bucket) in &self.buckets {
            for dependency in bucket {
                result
                    .entry(dependency.clone())
                    .or_default()
                    .push(name.clone());
            }
        }
        // bucket iteration is already name ordered
        result
    }

    /// Dependencies ordered by identity, or by display name when requested
    pub fn sorted_dependencies(&self, by_name: bool) -> Vec<&Dependency> {
        let mut dependencies: Vec<&Dependency> = self.dependencies().into_iter().collect();
        if by_name {
            dependencies.sort_by(|a, b| {
                a.display_name()
                    .to_lowercase()
                    .cmp(&b.display_name().to_lowercase())
                    .then_with(|| a.cmp(b))
            });
        }
        dependencies
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
