//! Resolution of dependencies left without a license
//!
//! Unsafe dependencies (the unknown bucket of the license map) are handed to
//! an ordered chain of resolvers. Each resolver only sees what the previous
//! ones left unresolved, so an earlier source always wins over a later one.

use crate::config::{MissingFileConfig, UnknownDependencyStrategy};
use crate::descriptor::{
    descriptor_coordinates, parse_descriptor, DescriptorLocator, LICENSE_SET_TYPE,
};
use crate::error::Result;
use crate::license_map::LicenseMap;
use crate::merge::MergeGroups;
use crate::properties::SortedProperties;
use crate::types::{Dependency, ID_SEPARATOR, UNKNOWN_LICENSE};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Licenses found for some unsafe dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: BTreeMap<Dependency, Vec<String>>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// One source of licenses for unsafe dependencies
pub trait UnsafeResolver {
    /// Name used in logs
    fn source(&self) -> &str;

    /// Licenses for whichever of the given dependencies this source knows
    fn resolve(&self, unsafe_dependencies: &BTreeSet<Dependency>) -> Result<Resolution>;
}

/// Split an `A|B` mapping value into license names; blank means none
pub fn split_licenses(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

fn resolve_from_mapping(
    mapping: &SortedProperties,
    unsafe_dependencies: &BTreeSet<Dependency>,
) -> Resolution {
    let mut resolution = Resolution::default();
    for dependency in unsafe_dependencies {
        let Some(value) = mapping.get(dependency.id()) else {
            continue;
        };
        let licenses = split_licenses(value);
        if licenses.is_empty() {
            debug!("{} is known to have no license", dependency);
            continue;
        }
        resolution.resolved.insert(dependency.clone(), licenses);
    }
    resolution
}

/// Resolver over an `identity=license` mapping (missing file or url content)
#[derive(Debug, Clone)]
pub struct MappingResolver {
    source: String,
    mapping: SortedProperties,
}

impl MappingResolver {
    pub fn new(source: impl Into<String>, mapping: SortedProperties) -> Self {
        Self {
            source: source.into(),
            mapping,
        }
    }
}

impl UnsafeResolver for MappingResolver {
    fn source(&self) -> &str {
        &self.source
    }

    fn resolve(&self, unsafe_dependencies: &BTreeSet<Dependency>) -> Result<Resolution> {
        Ok(resolve_from_mapping(&self.mapping, unsafe_dependencies))
    }
}

/// Resolver over third-party descriptors published with the dependencies
///
/// Global license sets are read first, then the descriptor of every candidate
/// in order, stopping as soon as nothing is left to resolve.
pub struct DescriptorResolver<'a> {
    locator: &'a dyn DescriptorLocator,
    candidates: Vec<Dependency>,
}

impl<'a> DescriptorResolver<'a> {
    /// Candidates are the project dependencies that are not unsafe themselves
    pub fn new(
        locator: &'a dyn DescriptorLocator,
        dependencies: &BTreeMap<String, Dependency>,
        unsafe_dependencies: &BTreeSet<Dependency>,
    ) -> Self {
        let candidates = dependencies
            .values()
            .filter(|dependency| !unsafe_dependencies.contains(*dependency))
            .cloned()
            .collect();
        Self {
            locator,
            candidates,
        }
    }

    fn license_sets(&self) -> impl Iterator<Item = &Dependency> {
        self.candidates
            .iter()
            .filter(|d| d.coordinates.kind == LICENSE_SET_TYPE)
    }
}

impl UnsafeResolver for DescriptorResolver<'_> {
    fn source(&self) -> &str {
        "third-party descriptors"
    }

    fn resolve(&self, unsafe_dependencies: &BTreeSet<Dependency>) -> Result<Resolution> {
        let mut remaining = unsafe_dependencies.clone();
        let mut resolution = Resolution::default();

        let global = self.license_sets().map(|d| d.coordinates.clone());
        let descriptors = self
            .candidates
            .iter()
            .map(|d| descriptor_coordinates(&d.coordinates));

        for coordinates in global.chain(descriptors) {
            if remaining.is_empty() {
                break;
            }
            let Some(content) = self.locator.locate(&coordinates)? else {
                continue;
            };
            if content.trim().is_empty() {
                debug!("Descriptor {} is empty", coordinates.id());
                continue;
            }
            let mapping = parse_descriptor(&coordinates.id(), &content)?;
            let found = resolve_from_mapping(&mapping, &remaining);
            for (dependency, licenses) in found.resolved {
                debug!("{} resolved by descriptor {}", dependency, coordinates.id());
                remaining.remove(&dependency);
                resolution.resolved.insert(dependency, licenses);
            }
        }

        Ok(resolution)
    }
}

/// Outcome of running the resolver chain
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    /// identity -> `A|B` licenses of every dependency resolved by the chain
    pub resolved: BTreeMap<String, String>,
    /// Dependencies no resolver could resolve
    pub still_unsafe: BTreeSet<Dependency>,
}

/// Resolvers applied left to right
#[derive(Default)]
pub struct ResolverChain<'a> {
    resolvers: Vec<Box<dyn UnsafeResolver + 'a>>,
}

impl<'a> ResolverChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resolver: impl UnsafeResolver + 'a) {
        self.resolvers.push(Box::new(resolver));
    }

    pub fn with(mut self, resolver: impl UnsafeResolver + 'a) -> Self {
        self.push(resolver);
        self
    }

    /// Resolve the unsafe dependencies of the map
    ///
    /// Resolved license names are mapped to their canonical merge name.
    pub fn run(&self, map: &mut LicenseMap, merges: &MergeGroups) -> Result<ChainOutcome> {
        let mut outcome = ChainOutcome {
            resolved: BTreeMap::new(),
            still_unsafe: map.unknown().cloned().unwrap_or_default(),
        };

        for resolver in &self.resolvers {
            if outcome.still_unsafe.is_empty() {
                break;
            }
            let resolution = resolver.resolve(&outcome.still_unsafe)?;
            let mut count = 0;
            for (dependency, licenses) in resolution.resolved {
                if !outcome.still_unsafe.remove(&dependency) {
                    continue;
                }
                for license in &licenses {
                    map.promote(&dependency, merges.canonical_name(license));
                }
                outcome
                    .resolved
                    .insert(dependency.id().to_string(), licenses.join("|"));
                count += 1;
            }
            if count > 0 {
                info!("{} dependencies resolved from {}", count, resolver.source());
            }
        }

        Ok(outcome)
    }
}

/// Replace the licenses of dependencies named by an override mapping
///
/// Entries with a blank value are ignored. Entries naming a dependency that
/// is not part of the project are logged and skipped.
pub fn apply_overrides(
    map: &mut LicenseMap,
    overrides: &SortedProperties,
    dependencies: &BTreeMap<String, Dependency>,
    merges: &MergeGroups,
    remote: bool,
) {
    for (id, value) in overrides.iter() {
        let licenses = split_licenses(value);
        if licenses.is_empty() {
            continue;
        }
        let Some(dependency) = dependencies.get(id) else {
            if remote {
                debug!("Override for {} ignored: not a project dependency", id);
            } else {
                warn!("Override for {} ignored: not a project dependency", id);
            }
            continue;
        };
        if dependency.is_system_scoped() {
            continue;
        }
        map.remove_dependency(dependency);
        for license in &licenses {
            map.put(merges.canonical_name(license), dependency.clone());
        }
        debug!("Licenses of {} overridden with {}", id, licenses.join(", "));
    }
}

/// Clean a loaded missing file against the project dependencies
///
/// Legacy keys carrying type and classifier are rewritten to the current
/// identity of the dependency. Keys naming no project dependency are dropped.
pub fn clean_mapping(
    raw: &SortedProperties,
    dependencies: &BTreeMap<String, Dependency>,
    strategy: UnknownDependencyStrategy,
    source: &str,
) -> SortedProperties {
    let mut cleaned = SortedProperties::new();

    for (key, value) in raw.iter() {
        if dependencies.contains_key(key) {
            cleaned.insert(key, value);
            continue;
        }
        match migrate_key(key, dependencies) {
            Some(id) => {
                debug!("Migrating missing file key {} to {}", key, id);
                if !raw.contains_key(id) && !cleaned.contains_key(id) {
                    cleaned.insert(id, value);
                }
            }
            None => match strategy {
                UnknownDependencyStrategy::Warn => warn!(
                    "Dependency [{}] is mentioned in {} but isn't used in the project, removing it",
                    key, source
                ),
                UnknownDependencyStrategy::Ignore => debug!(
                    "Dependency [{}] of {} isn't used in the project, removing it",
                    key, source
                ),
            },
        }
    }

    cleaned
}

/// Current identity of a legacy `g--a--v--type[--classifier]` key
fn migrate_key<'a>(key: &str, dependencies: &'a BTreeMap<String, Dependency>) -> Option<&'a str> {
    let parts: Vec<&str> = key.split(ID_SEPARATOR).collect();
    if parts.len() < 4 {
        return None;
    }
    let gav = parts[..3].join(ID_SEPARATOR);
    let kind = parts[3];
    let classifier = parts.get(4).copied();

    dependencies
        .values()
        .find(|d| {
            d.coordinates.gav_key() == gav
                && d.coordinates.kind == kind
                && d.coordinates.classifier.as_deref() == classifier
        })
        .map(Dependency::id)
}

/// Content of the missing file after a run and whether it must be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFileUpdate {
    pub path: PathBuf,
    pub mapping: SortedProperties,
    pub regenerate: bool,
}

/// Compute the missing file content and whether it has to be rewritten
///
/// It is rewritten when forced, when a dependency is missing a license and
/// is not yet listed on disk, when the file does not exist but has content,
/// or when the content differs from the file on disk.
pub fn compute_missing_file(
    config: &MissingFileConfig,
    on_disk: Option<&SortedProperties>,
    local: &SortedProperties,
    outcome: &ChainOutcome,
    still_unsafe: &BTreeSet<Dependency>,
) -> MissingFileUpdate {
    let mut mapping = local.clone();
    for (id, value) in &outcome.resolved {
        if mapping.get(id).map_or(true, |v| split_licenses(v).is_empty()) {
            mapping.insert(id.clone(), value.clone());
        }
    }
    for dependency in still_unsafe {
        if !mapping.contains_key(dependency.id()) {
            mapping.insert(dependency.id(), "");
        }
    }

    let regenerate = if config.force {
        !mapping.is_empty()
    } else {
        let new_unsafe = still_unsafe
            .iter()
            .any(|d| !on_disk.is_some_and(|disk| disk.contains_key(d.id())));
        match on_disk {
            None => !mapping.is_empty(),
            Some(disk) => new_unsafe || *disk != mapping,
        }
    };

    MissingFileUpdate {
        path: config.missing_file.clone(),
        mapping,
        regenerate,
    }
}

impl MissingFileUpdate {
    /// Render the missing file, listing the licenses already used
    pub fn render(&self, licenses: &LicenseMap) -> String {
        self.mapping.render(&self.header(licenses))
    }

    /// Write the missing file
    pub fn store(&self, licenses: &LicenseMap) -> Result<()> {
        info!("Writing missing file {}", self.path.display());
        self.mapping.store(&self.path, &self.header(licenses))
    }

    fn header(&self, licenses: &LicenseMap) -> Vec<String> {
        let mut header = vec![
            format!("Generated by {}", env!("CARGO_PKG_NAME")),
            "-------------------------------------------------------------------------------"
                .to_string(),
            "Already used licenses in project :".to_string(),
        ];
        header.extend(
            licenses
                .iter()
                .filter(|(name, bucket)| *name != UNKNOWN_LICENSE && !bucket.is_empty())
                .map(|(name, _)| format!("- {}", name)),
        );
        header.push(
            "-------------------------------------------------------------------------------"
                .to_string(),
        );
        header.push("Please fill the missing licenses for dependencies :".to_string());
        header.push(String::new());
        header
    }
}
