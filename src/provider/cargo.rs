//! Dependency graph of a Cargo project, read through `cargo metadata`

use super::DependencyGraphProvider;
use crate::error::{LicenseError, Result};
use crate::types::{Artifact, Coordinates, DeclaredLicense, Dependency, DEFAULT_SCOPE};
use cargo_metadata::{
    CargoOpt, DependencyKind, Metadata, MetadataCommand, Node, NodeDep, Package, PackageId,
};
use std::collections::{HashMap, HashSet, VecDeque};
use spdx::expression::{ExprNode, ExpressionReq, Operator};
use spdx::LicenseItem;
use std::path::Path;
use tracing::debug;

/// Artifact type of every crate node
pub const CRATE_TYPE: &str = "crate";

const BUILD_SCOPE: &str = "build";
const TEST_SCOPE: &str = "test";

#[derive(Debug, Clone)]
struct CrateInfo {
    name: String,
    license: Option<String>,
    license_file: Option<String>,
    url: Option<String>,
}

/// Dependency graph of a Cargo project
///
/// The group of a crate is where it comes from (`crates.io`, `git` or
/// `path`). Dev-dependencies get the `test` scope and build-dependencies the
/// `build` scope, as do the crates they pull in.
#[derive(Debug, Clone)]
pub struct CargoGraph {
    name: String,
    artifacts: Vec<Artifact>,
    crates: HashMap<String, CrateInfo>,
}

/// Breadth-first walk keeping, for every crate, the strongest scope it is
/// reached with; a crate whose scope gets stronger is walked again
#[derive(Default)]
struct GraphWalk<'a> {
    index: HashMap<&'a PackageId, usize>,
    artifacts: Vec<Artifact>,
    crates: HashMap<String, CrateInfo>,
    queue: VecDeque<(&'a PackageId, &'static str)>,
}

impl<'a> GraphWalk<'a> {
    fn reach(
        &mut self,
        id: &'a PackageId,
        package: &Package,
        scope: &'static str,
        trail: Vec<String>,
        optional: bool,
    ) {
        if let Some(&index) = self.index.get(id) {
            let artifact = &mut self.artifacts[index];
            if scope_rank(scope) > scope_rank(&artifact.scope) {
                debug!("{} is also a {} dependency", artifact.id(), scope);
                artifact.scope = scope.to_string();
                self.queue.push_back((id, scope));
            }
            return;
        }

        let mut artifact = Artifact::new(coordinates(package));
        artifact.scope = scope.to_string();
        artifact.optional = optional;
        artifact.direct = trail.is_empty();
        artifact.trail = trail;
        self.crates.insert(artifact.id(), crate_info(package));
        self.index.insert(id, self.artifacts.len());
        self.artifacts.push(artifact);
        self.queue.push_back((id, scope));
    }
}

impl CargoGraph {
    /// Run `cargo metadata` on a project directory
    pub fn load(project_path: &Path) -> Result<Self> {
        let metadata = get_cargo_metadata(project_path)?;
        Self::from_metadata(&metadata)
    }

    pub fn from_metadata(metadata: &Metadata) -> Result<Self> {
        let resolve = metadata
            .resolve
            .as_ref()
            .ok_or_else(|| LicenseError::parse("No dependency resolution found"))?;

        let packages: HashMap<&PackageId, &Package> =
            metadata.packages.iter().map(|p| (&p.id, p)).collect();
        let nodes: HashMap<&PackageId, &Node> = resolve.nodes.iter().map(|n| (&n.id, n)).collect();

        // Workspace: every member is a root
        let roots: Vec<&PackageId> = match &resolve.root {
            Some(root) => vec![root],
            None => metadata.workspace_members.iter().collect(),
        };

        let name = roots
            .first()
            .and_then(|id| packages.get(id))
            .map(|p| p.name.clone())
            .ok_or_else(|| LicenseError::parse("Could not determine project name"))?;

        let root_ids: HashSet<&PackageId> = roots.iter().copied().collect();
        let mut walk = GraphWalk::default();

        for root in &roots {
            let (Some(node), Some(root_pkg)) = (nodes.get(root), packages.get(root)) else {
                continue;
            };
            for dep in &node.deps {
                let Some(pkg) = packages.get(&dep.pkg) else {
                    continue;
                };
                if root_ids.contains(&dep.pkg) {
                    continue;
                }
                let optional = root_pkg
                    .dependencies
                    .iter()
                    .any(|d| d.name == pkg.name && d.optional);
                walk.reach(&dep.pkg, pkg, edge_scope(dep), Vec::new(), optional);
            }
        }

        while let Some((id, parent_scope)) = walk.queue.pop_front() {
            let (Some(node), Some(parent), Some(&index)) =
                (nodes.get(id), packages.get(id), walk.index.get(id))
            else {
                continue;
            };
            let mut trail = walk.artifacts[index].trail.clone();
            trail.push(ga(parent));

            for dep in &node.deps {
                let Some(pkg) = packages.get(&dep.pkg) else {
                    continue;
                };
                if root_ids.contains(&dep.pkg) {
                    continue;
                }
                let scope = if parent_scope == DEFAULT_SCOPE {
                    edge_scope(dep)
                } else {
                    parent_scope
                };
                walk.reach(&dep.pkg, pkg, scope, trail.clone(), false);
            }
        }

        let GraphWalk {
            artifacts, crates, ..
        } = walk;

        debug!("{} crates found in the graph of {}", artifacts.len(), name);

        Ok(Self {
            name,
            artifacts,
            crates,
        })
    }
}

impl DependencyGraphProvider for CargoGraph {
    fn project_name(&self) -> &str {
        &self.name
    }

    fn artifacts(&self) -> Result<Vec<Artifact>> {
        Ok(self.artifacts.clone())
    }

    fn resolve(&self, artifact: &Artifact) -> Result<Dependency> {
        let id = artifact.id();
        let info = self
            .crates
            .get(&id)
            .ok_or_else(|| LicenseError::resolution(&id, "crate not found in cargo metadata"))?;

        let mut licenses = info
            .license
            .as_deref()
            .map(split_license_expression)
            .unwrap_or_default();
        if licenses.is_empty() {
            if let Some(file) = &info.license_file {
                licenses.push(DeclaredLicense::url_only(file.clone()));
            }
        }

        let mut dependency = Dependency::from_artifact(artifact, licenses).with_name(&info.name);
        dependency.url = info.url.clone();
        Ok(dependency)
    }
}

/// Get cargo metadata for a project
fn get_cargo_metadata(project_path: &Path) -> Result<Metadata> {
    let manifest_path = project_path.join("Cargo.toml");

    if !manifest_path.exists() {
        return Err(LicenseError::parse(format!(
            "Cargo.toml not found at {}",
            manifest_path.display()
        )));
    }

    let metadata = MetadataCommand::new()
        .manifest_path(&manifest_path)
        .features(CargoOpt::AllFeatures)
        .exec()?;

    Ok(metadata)
}

/// Normal over build over dev
fn scope_rank(scope: &str) -> u8 {
    match scope {
        DEFAULT_SCOPE => 2,
        BUILD_SCOPE => 1,
        _ => 0,
    }
}

/// Scope of a dependency edge: a normal edge wins over build, build over dev
fn edge_scope(dep: &NodeDep) -> &'static str {
    let has = |kind: DependencyKind| dep.dep_kinds.iter().any(|info| info.kind == kind);
    if dep.dep_kinds.is_empty() || has(DependencyKind::Normal) {
        DEFAULT_SCOPE
    } else if has(DependencyKind::Build) {
        BUILD_SCOPE
    } else {
        TEST_SCOPE
    }
}

fn coordinates(package: &Package) -> Coordinates {
    Coordinates::new(
        determine_origin(package),
        package.name.clone(),
        package.version.to_string(),
    )
    .with_kind(CRATE_TYPE)
}

fn ga(package: &Package) -> String {
    format!("{}:{}", determine_origin(package), package.name)
}

fn crate_info(package: &Package) -> CrateInfo {
    CrateInfo {
        name: package.name.clone(),
        license: package.license.clone(),
        license_file: package.license_file.as_ref().map(|p| p.to_string()),
        url: package.homepage.clone().or_else(|| package.repository.clone()),
    }
}

/// Where a package comes from, used as its group
fn determine_origin(package: &Package) -> &'static str {
    match &package.source {
        Some(source) if source.repr.starts_with("registry+") => "crates.io",
        Some(source) if source.repr.starts_with("sparse+") => "crates.io",
        Some(source) if source.repr.starts_with("git+") => "git",
        _ => "path",
    }
}

/// Split an SPDX expression into one declared license per `OR` alternative
///
/// Each alternative keeps the text the crate declares, so `GPL-3.0-only`
/// stays `GPL-3.0-only`. A conjunction is a single license: its terms are
/// joined with ` AND ` and never offered as separate alternatives.
/// Expressions that do not parse are kept whole.
pub fn split_license_expression(expression: &str) -> Vec<DeclaredLicense> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Vec::new();
    }

    let parsed = match spdx::Expression::parse_mode(expression, spdx::ParseMode::LAX) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Keeping license expression '{}' as is: {}", expression, e);
            return vec![DeclaredLicense::named(expression)];
        }
    };

    let source: &str = parsed.as_ref();
    // each entry is a disjunction of conjunctions, in postfix order
    let mut stack: Vec<Vec<Vec<String>>> = Vec::new();
    for node in parsed.iter() {
        match node {
            ExprNode::Req(requirement) => {
                stack.push(vec![vec![declared_term(source, requirement)]]);
            }
            ExprNode::Op(op) => {
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                    return vec![DeclaredLicense::named(expression)];
                };
                let combined = match op {
                    Operator::Or => left.into_iter().chain(right).collect(),
                    Operator::And => left
                        .iter()
                        .flat_map(|l| {
                            right.iter().map(move |r| {
                                let mut terms = l.clone();
                                terms.extend(r.iter().cloned());
                                terms
                            })
                        })
                        .collect(),
                };
                stack.push(combined);
            }
        }
    }

    let mut names: Vec<String> = Vec::new();
    for mut terms in stack.into_iter().flatten() {
        terms.dedup();
        let name = terms.join(" AND ");
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.into_iter().map(DeclaredLicense::named).collect()
}

/// Source text of a requirement; the span only covers the license id
fn declared_term(source: &str, requirement: &ExpressionReq) -> String {
    let span_end = requirement.span.end as usize;
    let Some(id) = source.get(requirement.span.start as usize..span_end) else {
        return requirement.req.to_string();
    };
    let mut term = id.trim().to_string();
    let or_later = matches!(requirement.req.license, LicenseItem::Spdx { or_later: true, .. });
    if or_later && !term.ends_with('+') && source[span_end..].trim_start().starts_with('+') {
        term.push('+');
    }
    if let Some(exception) = &requirement.req.exception {
        term.push_str(" WITH ");
        term.push_str(exception.name);
    }
    term
}
