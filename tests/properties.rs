//! Property tests for the filter, merge and policy stages

use proptest::prelude::*;
use std::collections::BTreeSet;
use thirdparty_license_audit::{
    check_forbidden_licenses, merge_licenses, Artifact, ArtifactFilters, Coordinates,
    DeclaredLicense, Dependency, DependencyFilters, LicenseMap, MergeGroups, UNKNOWN_LICENSE,
};

const LICENSES: &[&str] = &["MIT", "ASL", "Apache-2.0", "GPL", "BSD", "EPL"];

fn artifact_strategy() -> impl Strategy<Value = Artifact> {
    (
        prop::sample::select(vec!["org.example", "org.other", "com.acme"]),
        prop::sample::select(vec!["core", "util", "web", "test-kit"]),
        prop::sample::select(vec!["1.0", "2.0"]),
        prop::sample::select(vec!["compile", "test", "runtime", "system"]),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(group, name, version, scope, optional, direct)| {
            let mut artifact = Artifact::new(Coordinates::new(group, name, version));
            artifact.scope = scope.to_string();
            artifact.optional = optional;
            artifact.direct = direct;
            if !direct {
                artifact.trail = vec![format!("{}:{}", group, "core")];
            }
            artifact
        })
}

fn filters_strategy() -> impl Strategy<Value = DependencyFilters> {
    (
        prop::option::of(prop::sample::select(vec!["org", "acme", "^com", "("])),
        prop::option::of(prop::sample::select(vec!["util", "kit", "web"])),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(include, exclude, include_optional, include_transitive, transitive_of_excluded)| {
                DependencyFilters {
                    included_groups: include.map(String::from),
                    excluded_artifacts: exclude.map(String::from),
                    include_optional,
                    include_transitive,
                    exclude_transitive_of_excluded: transitive_of_excluded,
                    ..DependencyFilters::default()
                }
            },
        )
}

fn map_strategy() -> impl Strategy<Value = LicenseMap> {
    prop::collection::btree_map(
        prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]),
        prop::collection::vec(prop::sample::select(LICENSES.to_vec()), 0..3),
        0..6,
    )
    .prop_map(|entries| {
        let dependencies: Vec<Dependency> = entries
            .into_iter()
            .map(|(name, licenses)| {
                Dependency::new(
                    Coordinates::new("org.example", name, "1.0"),
                    licenses.into_iter().map(DeclaredLicense::named).collect(),
                )
            })
            .collect();
        LicenseMap::from_dependencies(dependencies.iter())
    })
}

fn owned(map: &LicenseMap) -> BTreeSet<Dependency> {
    map.dependencies().into_iter().cloned().collect()
}

proptest! {
    #[test]
    fn prop_filter_is_idempotent(
        artifacts in prop::collection::vec(artifact_strategy(), 0..12),
        config in filters_strategy(),
    ) {
        let filters = ArtifactFilters::compile(&config);
        let once = filters.filter(&artifacts);
        let kept: Vec<Artifact> = once.values().cloned().collect();
        let twice = filters.filter(&kept);

        prop_assert_eq!(once.keys().collect::<Vec<_>>(), twice.keys().collect::<Vec<_>>());
    }

    #[test]
    fn prop_merge_is_idempotent_and_keeps_dependencies(map in map_strategy()) {
        let groups = MergeGroups::parse(&["Apache-2.0|ASL", "BSD|EPL"]);

        let mut once = map.clone();
        merge_licenses(&mut once, &groups);
        let mut twice = once.clone();
        merge_licenses(&mut twice, &groups);

        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(owned(&map), owned(&once));
        prop_assert!(!once.contains_license("ASL"));
        prop_assert!(!once.contains_license("EPL"));
    }

    #[test]
    fn prop_unlicensed_dependency_is_only_unknown(map in map_strategy()) {
        for (license, bucket) in map.iter() {
            for dependency in bucket {
                if dependency.licenses.is_empty() {
                    prop_assert_eq!(license, UNKNOWN_LICENSE);
                } else {
                    prop_assert_ne!(license, UNKNOWN_LICENSE);
                }
            }
        }
    }

    #[test]
    fn prop_no_lists_is_always_safe(map in map_strategy()) {
        let mut map = map;
        let before = map.clone();
        let check = check_forbidden_licenses(
            &mut map,
            &BTreeSet::new(),
            &BTreeSet::new(),
            &BTreeSet::new(),
        );

        prop_assert!(check.safe);
        prop_assert_eq!(map, before);
    }
}
