//! # thirdparty_license_audit
//!
//! Third-party license reconciliation for dependency graphs:
//! - **License map**: group dependencies by declared license, with a sentinel
//!   bucket for dependencies without any license
//! - **Merges**: collapse license aliases into one canonical name
//! - **Missing licenses**: resolve unknown licenses from a local missing file,
//!   descriptors published next to dependencies and shared remote lists
//! - **Policy**: allow/deny/hidden license lists and a dependency allow-list
//!
//! ## Quick Start
//!
//! ```no_run
//! use thirdparty_license_audit::{audit_project, CargoGraph, ThirdPartyConfig};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = ThirdPartyConfig::default();
//! let graph = CargoGraph::load(Path::new("."))?;
//! let report = audit_project(&graph, &config).await?;
//!
//! for (license, dependencies) in report.licenses.iter() {
//!     println!("{}: {} dependencies", license, dependencies.len());
//! }
//! # Ok(())
//! # }
//! ```

mod audit;
mod config;
mod descriptor;
mod error;
mod fetch;
mod filter;
mod license_map;
mod merge;
mod policy;
mod properties;
mod provider;
mod report;
mod resolver;
mod types;
mod whitelist;

// Re-export public API
pub use audit::{
    audit_aggregate, audit_project, log_violations, resolve_modules, resolve_project,
    RemoteInputs,
};
pub use config::{
    split_list, DependencyFilters, FailurePolicy, LicensePolicy, MissingFileConfig,
    NetworkConfig, OutputConfig, Severity, ThirdPartyConfig, ThirdPartyConfigBuilder,
    UnknownDependencyStrategy, WhitelistConfig, WhitelistEntry,
};
pub use descriptor::{
    descriptor_coordinates, parse_descriptor, DescriptorLocator, LocalRepository,
    DESCRIPTOR_CLASSIFIER, DESCRIPTOR_TYPE, LICENSE_SET_TYPE,
};
pub use error::{LicenseError, Result};
pub use fetch::{fetch_optional, fetch_text, is_remote};
pub use filter::{load_dependencies, ArtifactFilters, CompiledPattern, DependencyCache};
pub use license_map::LicenseMap;
pub use merge::{merge_licenses, MergeGroup, MergeGroups};
pub use policy::{check_forbidden_licenses, ForbiddenCheck};
pub use properties::SortedProperties;
pub use provider::cargo::split_license_expression;
pub use provider::{CargoGraph, DependencyGraphProvider, GraphNode, StaticGraph};
pub use report::{
    dependency_line, generate_json_report, generate_markdown_report, generate_report,
    render_third_party, ReportFormat,
};
pub use resolver::{
    apply_overrides, clean_mapping, compute_missing_file, split_licenses, ChainOutcome,
    DescriptorResolver, MappingResolver, MissingFileUpdate, Resolution, ResolverChain,
    UnsafeResolver,
};
pub use types::{
    Artifact, Coordinates, DeclaredLicense, Dependency, ReportSummary, ThirdPartyReport,
    DEFAULT_SCOPE, SYSTEM_SCOPE, UNKNOWN_LICENSE,
};
pub use whitelist::{DependencyWhitelist, WhitelistCheck};
