//! Main orchestration: filter, license map, merge, resolve, policy

use crate::config::ThirdPartyConfig;
use crate::descriptor::LocalRepository;
use crate::error::Result;
use crate::fetch::{fetch_optional, is_remote};
use crate::filter::{load_dependencies, ArtifactFilters, DependencyCache};
use crate::license_map::LicenseMap;
use crate::merge::MergeGroups;
use crate::policy::check_forbidden_licenses;
use crate::properties::SortedProperties;
use crate::provider::DependencyGraphProvider;
use crate::resolver::{
    apply_overrides, clean_mapping, compute_missing_file, split_licenses, ChainOutcome,
    DescriptorResolver, MappingResolver, ResolverChain,
};
use crate::types::{Dependency, ThirdPartyReport};
use crate::whitelist::DependencyWhitelist;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Remote content used by a run, fetched before resolution starts
#[derive(Debug, Clone, Default)]
pub struct RemoteInputs {
    /// Merge list behind `license_merges_url`
    pub merges: Option<String>,
    /// Missing file behind `missing_file_url`
    pub missing: Option<String>,
    /// Override list behind `override_url`
    pub overrides: Option<String>,
}

impl RemoteInputs {
    /// Fetch every configured remote list
    pub async fn fetch(config: &ThirdPartyConfig) -> Result<Self> {
        let network = &config.network;
        Ok(Self {
            merges: fetch_optional(config.license_policy.license_merges_url.as_deref(), network)
                .await?,
            missing: fetch_optional(config.missing.missing_file_url.as_deref(), network).await?,
            overrides: fetch_optional(config.missing.override_url.as_deref(), network).await?,
        })
    }
}

/// Audit the third-party licenses of one project
pub async fn audit_project(
    provider: &dyn DependencyGraphProvider,
    config: &ThirdPartyConfig,
) -> Result<ThirdPartyReport> {
    let remote = RemoteInputs::fetch(config).await?;
    resolve_project(provider, config, &remote)
}

/// Audit several modules as one aggregate
pub async fn audit_aggregate(
    name: &str,
    providers: &[&dyn DependencyGraphProvider],
    config: &ThirdPartyConfig,
) -> Result<ThirdPartyReport> {
    let remote = RemoteInputs::fetch(config).await?;
    resolve_modules(name, providers, config, &remote)
}

/// Resolve one project with remote content already fetched
pub fn resolve_project(
    provider: &dyn DependencyGraphProvider,
    config: &ThirdPartyConfig,
    remote: &RemoteInputs,
) -> Result<ThirdPartyReport> {
    resolve_modules(provider.project_name(), &[provider], config, remote)
}

/// Resolve modules one after the other and report on the union of their maps
pub fn resolve_modules(
    name: &str,
    providers: &[&dyn DependencyGraphProvider],
    config: &ThirdPartyConfig,
    remote: &RemoteInputs,
) -> Result<ThirdPartyReport> {
    info!("Resolving third-party licenses of {}", name);

    let filters = ArtifactFilters::compile(&config.filters);
    let mut cache = DependencyCache::new();
    let mut modules = Vec::with_capacity(providers.len());
    let mut all_dependencies: BTreeMap<String, Dependency> = BTreeMap::new();

    for provider in providers {
        let dependencies = load_dependencies(*provider, &filters, &mut cache)?;
        info!(
            "Found {} dependencies for module '{}'",
            dependencies.len(),
            provider.project_name()
        );
        for (id, dependency) in &dependencies {
            all_dependencies
                .entry(id.clone())
                .or_insert_with(|| dependency.clone());
        }
        modules.push(dependencies);
    }

    let merges = MergeGroups::parse_with_list(
        &config.license_policy.license_merges,
        remote.merges.as_deref(),
    );

    let missing = &config.missing;
    let (on_disk, local) = if missing.use_missing_file {
        let on_disk = if missing.missing_file.exists() {
            Some(SortedProperties::load(&missing.missing_file)?)
        } else {
            debug!("No missing file at {}", missing.missing_file.display());
            None
        };
        let local = on_disk
            .as_ref()
            .map(|raw| {
                clean_mapping(
                    raw,
                    &all_dependencies,
                    missing.unknown_dependency_strategy,
                    "the missing file",
                )
            })
            .unwrap_or_default();
        (on_disk, Some(local))
    } else {
        (None, None)
    };

    let repository = LocalRepository::new(missing.repositories.clone());
    let remote_missing = remote.missing.as_deref().map(SortedProperties::parse);
    let overrides = remote.overrides.as_deref().map(SortedProperties::parse);
    let overrides_remote = missing.override_url.as_deref().is_some_and(is_remote);

    let mut licenses = LicenseMap::new();
    let mut outcome = ChainOutcome::default();
    let mut resolved: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for dependencies in &modules {
        let mut map = LicenseMap::from_dependencies(dependencies.values());
        merges.apply(&mut map);

        let unsafe_dependencies = map.unknown().cloned().unwrap_or_default();
        let mut chain = ResolverChain::new();
        if let Some(local) = &local {
            chain.push(MappingResolver::new("the missing file", local.clone()));
        }
        if missing.use_repository_descriptors {
            chain.push(DescriptorResolver::new(
                &repository,
                dependencies,
                &unsafe_dependencies,
            ));
        }
        if let Some(mapping) = &remote_missing {
            chain.push(MappingResolver::new("the missing file url", mapping.clone()));
        }

        let module_outcome = chain.run(&mut map, &merges)?;
        for (id, value) in module_outcome.resolved {
            resolved
                .entry(id)
                .or_default()
                .extend(split_licenses(&value));
        }

        if let Some(overrides) = &overrides {
            apply_overrides(&mut map, overrides, dependencies, &merges, overrides_remote);
        }

        licenses.union(&map);
    }

    // modules resolving the same dependency differently contribute every license
    outcome.resolved = resolved
        .into_iter()
        .map(|(id, names)| (id, names.into_iter().collect::<Vec<_>>().join("|")))
        .collect();
    outcome.still_unsafe = licenses.unknown().cloned().unwrap_or_default();

    let missing_file = local.as_ref().map(|local| {
        compute_missing_file(missing, on_disk.as_ref(), local, &outcome, &outcome.still_unsafe)
    });

    let policy = &config.license_policy;
    let forbidden = check_forbidden_licenses(
        &mut licenses,
        &policy.included(),
        &policy.excluded(),
        &policy.hidden(),
    );

    let whitelist = DependencyWhitelist::from_config(&config.whitelist)?;
    let whitelist_check =
        (!whitelist.is_empty()).then(|| whitelist.check(all_dependencies.values()));

    let mut report = ThirdPartyReport::new(name.to_string(), licenses, forbidden);
    report.whitelist = whitelist_check;
    report.missing_file = missing_file;
    report.compute_summary();

    log_violations(&report);

    info!(
        "Resolution complete: {} dependencies, {} licenses, {} without license, {} forbidden licenses",
        report.summary.total_dependencies,
        report.summary.license_count,
        report.summary.unsafe_count,
        report.summary.forbidden_license_count,
    );

    Ok(report)
}

/// Log detected violations, grouped by license and dependency
pub fn log_violations(report: &ThirdPartyReport) {
    if report.has_missing_licenses() {
        warn!(
            "There are {} dependencies with no license:",
            report.unsafe_dependencies.len()
        );
        for dependency in &report.unsafe_dependencies {
            warn!(" - {}", dependency);
        }
    }

    for license in &report.forbidden.blacklisted {
        let users = report
            .licenses
            .get(license)
            .map(|bucket| bucket.iter().map(|d| d.id()).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        warn!("Forbidden license {} used by: {}", license, users);
    }

    for (license, dependencies) in &report.forbidden.not_allowed {
        warn!("License {} is not allowed:", license);
        for id in dependencies {
            warn!(" - {}", id);
        }
    }
}
