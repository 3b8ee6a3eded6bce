//! Allowed / forbidden license evaluation

use crate::license_map::LicenseMap;
use crate::types::{Dependency, UNKNOWN_LICENSE};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Outcome of the allow/deny license check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForbiddenCheck {
    /// No license is forbidden or used without an allowed alternative
    pub safe: bool,
    /// Used licenses named by the exclude list
    pub blacklisted: BTreeSet<String>,
    /// Non-allowed license -> dependencies with no allowed alternative
    pub not_allowed: BTreeMap<String, BTreeSet<String>>,
    /// Dependency -> reason it was exempted from a non-allowed license
    pub exempted: BTreeMap<String, String>,
}

impl Default for ForbiddenCheck {
    fn default() -> Self {
        Self {
            safe: true,
            blacklisted: BTreeSet::new(),
            not_allowed: BTreeMap::new(),
            exempted: BTreeMap::new(),
        }
    }
}

impl ForbiddenCheck {
    /// Every license that made the check unsafe
    pub fn unsafe_licenses(&self) -> BTreeSet<String> {
        self.blacklisted
            .iter()
            .chain(self.not_allowed.keys())
            .cloned()
            .collect()
    }
}

/// Check the licenses of a map against allow, deny and hidden lists
///
/// The exclude list is evaluated first: a used license on it is unsafe and
/// gets no further consideration. Each remaining license that is not on the
/// allow list is unsafe unless every dependency under it is exempted, either
/// because the license is hidden or because the dependency also carries an
/// allowed license. Exempted dependencies are removed from the non-allowed
/// bucket, which itself stays in the map.
///
/// The unknown bucket is not a license and is left to the missing license
/// check.
pub fn check_forbidden_licenses(
    map: &mut LicenseMap,
    included: &BTreeSet<String>,
    excluded: &BTreeSet<String>,
    hidden: &BTreeSet<String>,
) -> ForbiddenCheck {
    let mut check = ForbiddenCheck::default();

    if !excluded.is_empty() {
        for (license, bucket) in map.iter() {
            if license == UNKNOWN_LICENSE || bucket.is_empty() {
                continue;
            }
            if excluded.contains(license) {
                warn!(
                    "License {} is forbidden and used by {} dependencies",
                    license,
                    bucket.len()
                );
                check.blacklisted.insert(license.to_string());
            }
        }
    }

    if !included.is_empty() {
        let candidates: Vec<String> = map
            .license_names()
            .filter(|license| {
                *license != UNKNOWN_LICENSE
                    && !included.contains(*license)
                    && !check.blacklisted.contains(*license)
            })
            .map(String::from)
            .collect();

        for license in candidates {
            let bucket = map.get(&license).cloned().unwrap_or_default();
            let mut forbidden = BTreeSet::new();
            let mut exempted: Vec<Dependency> = Vec::new();

            for dependency in bucket {
                if hidden.contains(&license) {
                    warn!(
                        "{} uses hidden license {}, not reporting it",
                        dependency, license
                    );
                    check
                        .exempted
                        .insert(dependency.id().to_string(), format!("hidden license {}", license));
                    exempted.push(dependency);
                    continue;
                }

                match allowed_alternative(map, included, &license, &dependency) {
                    Some(alternative) => {
                        debug!(
                            "{} is also licensed under {}, ignoring {}",
                            dependency, alternative, license
                        );
                        check
                            .exempted
                            .insert(dependency.id().to_string(), format!("also under {}", alternative));
                        exempted.push(dependency);
                    }
                    None => {
                        forbidden.insert(dependency.id().to_string());
                    }
                }
            }

            for dependency in &exempted {
                map.remove_from_bucket(&license, dependency);
            }

            if !forbidden.is_empty() {
                warn!(
                    "License {} is not allowed and used by: {}",
                    license,
                    forbidden.iter().cloned().collect::<Vec<_>>().join(", ")
                );
                check.not_allowed.insert(license, forbidden);
            }
        }
    }

    check.safe = check.blacklisted.is_empty() && check.not_allowed.is_empty();
    check
}

fn allowed_alternative(
    map: &LicenseMap,
    included: &BTreeSet<String>,
    license: &str,
    dependency: &Dependency,
) -> Option<String> {
    map.iter()
        .find(|(other, bucket)| {
            *other != license && included.contains(*other) && bucket.contains(dependency)
        })
        .map(|(other, _)| other.to_string())
}
