//! Configuration for dependency filtering, license policy and failure handling

use crate::error::{LicenseError, Result};
use crate::types::{ThirdPartyReport, SYSTEM_SCOPE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for one license resolution run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThirdPartyConfig {
    /// Which dependencies take part in the run
    pub filters: DependencyFilters,
    /// Allow/deny/hidden lists and merge groups
    pub license_policy: LicensePolicy,
    /// Missing-license file, override file and descriptor resolution
    pub missing: MissingFileConfig,
    /// Dependency allow-list
    pub whitelist: WhitelistConfig,
    /// Which violations fail the build
    pub failure: FailurePolicy,
    /// Report rendering options
    pub output: OutputConfig,
    /// Network configuration for remote lists
    pub network: NetworkConfig,
}

/// Include/exclude filters applied to the raw dependency set
///
/// Group and artifact patterns are regular expressions matched anywhere in
/// the value (`foo` matches `barfoobaz`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyFilters {
    pub included_groups: Option<String>,
    pub excluded_groups: Option<String>,
    pub included_artifacts: Option<String>,
    pub excluded_artifacts: Option<String>,
    /// Scopes to keep (empty = every scope)
    pub included_scopes: Vec<String>,
    /// Scopes to drop
    pub excluded_scopes: Vec<String>,
    /// Types to keep (empty = every type)
    pub included_types: Vec<String>,
    /// Types to drop
    pub excluded_types: Vec<String>,
    /// Keep optional dependencies
    pub include_optional: bool,
    /// Walk the whole graph instead of only direct dependencies
    pub include_transitive: bool,
    /// Drop dependencies pulled in through an excluded dependency
    pub exclude_transitive_of_excluded: bool,
}

/// License allow/deny policy configuration
///
/// Every list accepts pipe separated values (`"MIT|Apache-2.0"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensePolicy {
    /// Allowed licenses (empty = no allow-list)
    pub included_licenses: Vec<String>,
    /// Forbidden licenses
    pub excluded_licenses: Vec<String>,
    /// Licenses that pass the allow-list check without being listed
    pub hidden_licenses: Vec<String>,
    /// Merge groups, `canonical|alias|alias`
    pub license_merges: Vec<String>,
    /// Remote merge list, one group per line
    pub license_merges_url: Option<String>,
}

/// Missing-license file and remote resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingFileConfig {
    /// Resolve unknown licenses from the local missing file
    pub use_missing_file: bool,
    /// Local `identity=license` file
    pub missing_file: PathBuf,
    /// Shared `identity=license` list fetched from a url
    pub missing_file_url: Option<String>,
    /// `identity=license` list whose entries replace declared licenses
    pub override_url: Option<String>,
    /// Always rewrite the missing file
    pub force: bool,
    /// What to do with missing-file entries naming unknown dependencies
    pub unknown_dependency_strategy: UnknownDependencyStrategy,
    /// Look for `third-party` descriptors published next to dependencies
    pub use_repository_descriptors: bool,
    /// Local repository roots searched for descriptors
    pub repositories: Vec<PathBuf>,
}

/// Handling of entries that name dependencies absent from the project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDependencyStrategy {
    #[default]
    Warn,
    Ignore,
}

/// Dependency allow-list configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// `groupId:artifactId` -> accepted versions
    pub artifacts: BTreeMap<String, Vec<WhitelistEntry>>,
    /// `groupId:artifactId[:versionPattern]` shorthand entries
    pub coordinates: Vec<String>,
    /// Log level used when reporting unlisted dependencies
    pub severity: Severity,
}

/// One accepted version range of an allow-listed artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistEntry {
    /// Regular expression over the version; unset accepts every version
    pub version: Option<String>,
}

/// Reporting severity for allow-list violations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// Which detected violations turn into a build failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    pub fail_on_missing: bool,
    pub fail_on_blacklist: bool,
    pub fail_on_not_whitelisted_dependency: bool,
    /// Deprecated: same as `fail_on_missing` and `fail_on_blacklist` together
    pub fail_if_warning: bool,
}

/// Report rendering options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Group the third-party listing by license instead of by dependency
    pub group_by_license: bool,
    /// Order dependencies by display name instead of identity
    pub sort_by_name: bool,
}

/// Network configuration for fetching remote lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DependencyFilters {
    fn default() -> Self {
        Self {
            included_groups: None,
            excluded_groups: None,
            included_artifacts: None,
            excluded_artifacts: None,
            included_scopes: Vec::new(),
            excluded_scopes: vec![SYSTEM_SCOPE.to_string()],
            included_types: Vec::new(),
            excluded_types: Vec::new(),
            include_optional: true,
            include_transitive: true,
            exclude_transitive_of_excluded: false,
        }
    }
}

impl Default for MissingFileConfig {
    fn default() -> Self {
        Self {
            use_missing_file: true,
            missing_file: PathBuf::from("src/license/THIRD-PARTY.properties"),
            missing_file_url: None,
            override_url: None,
            force: false,
            unknown_dependency_strategy: UnknownDependencyStrategy::default(),
            use_repository_descriptors: false,
            repositories: Vec::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl NetworkConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LicensePolicy {
    pub fn included(&self) -> BTreeSet<String> {
        split_list(&self.included_licenses)
    }

    pub fn excluded(&self) -> BTreeSet<String> {
        split_list(&self.excluded_licenses)
    }

    pub fn hidden(&self) -> BTreeSet<String> {
        split_list(&self.hidden_licenses)
    }
}

impl FailurePolicy {
    pub fn should_fail_on_missing(&self) -> bool {
        self.fail_on_missing || self.fail_if_warning
    }

    pub fn should_fail_on_blacklist(&self) -> bool {
        self.fail_on_blacklist || self.fail_if_warning
    }

    /// Reasons the build must fail for this report (empty = pass)
    pub fn failures(&self, report: &ThirdPartyReport) -> Vec<String> {
        let mut failures = Vec::new();

        if self.should_fail_on_missing() && report.has_missing_licenses() {
            failures.push(format!(
                "{} dependencies with no license",
                report.unsafe_dependencies.len()
            ));
        }

        if self.should_fail_on_blacklist() && report.has_forbidden_licenses() {
            failures.push(format!(
                "forbidden licenses used: {}",
                report
                    .forbidden
                    .unsafe_licenses()
                    .into_iter()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if self.fail_on_not_whitelisted_dependency && report.has_unlisted_dependencies() {
            let unlisted = report
                .whitelist
                .as_ref()
                .map(|check| check.unlisted.len())
                .unwrap_or(0);
            failures.push(format!("{} dependencies not in the allow-list", unlisted));
        }

        failures
    }
}

/// Split pipe separated list entries into a set of trimmed names
pub fn split_list(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .flat_map(|value| value.split('|'))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .collect()
}

impl ThirdPartyConfig {
    /// Create a new builder for ThirdPartyConfig
    pub fn builder() -> ThirdPartyConfigBuilder {
        ThirdPartyConfigBuilder::default()
    }

    /// Parse a TOML configuration document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| LicenseError::file(path, e))?;
        Self::from_toml_str(&content)
    }
}

/// Builder for ThirdPartyConfig
#[derive(Default)]
pub struct ThirdPartyConfigBuilder {
    filters: Option<DependencyFilters>,
    license_policy: Option<LicensePolicy>,
    missing: Option<MissingFileConfig>,
    whitelist: Option<WhitelistConfig>,
    failure: Option<FailurePolicy>,
    output: Option<OutputConfig>,
    network: Option<NetworkConfig>,
}

impl ThirdPartyConfigBuilder {
    pub fn filters(mut self, filters: DependencyFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn license_policy(mut self, policy: LicensePolicy) -> Self {
        self.license_policy = Some(policy);
        self
    }

    pub fn missing(mut self, missing: MissingFileConfig) -> Self {
        self.missing = Some(missing);
        self
    }

    pub fn whitelist(mut self, whitelist: WhitelistConfig) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    pub fn failure(mut self, failure: FailurePolicy) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn output(mut self, output: OutputConfig) -> Self {
        self.output = Some(output);
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn build(self) -> ThirdPartyConfig {
        ThirdPartyConfig {
            filters: self.filters.unwrap_or_default(),
            license_policy: self.license_policy.unwrap_or_default(),
            missing: self.missing.unwrap_or_default(),
            whitelist: self.whitelist.unwrap_or_default(),
            failure: self.failure.unwrap_or_default(),
            output: self.output.unwrap_or_default(),
            network: self.network.unwrap_or_default(),
        }
    }
}
