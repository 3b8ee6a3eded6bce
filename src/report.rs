//! Report rendering: third-party listing, markdown and JSON

use crate::config::OutputConfig;
use crate::error::Result;
use crate::license_map::LicenseMap;
use crate::types::{Dependency, ThirdPartyReport, UNKNOWN_LICENSE};
use std::fmt::Write as _;

/// Output format of a report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain third-party listing
    Text,
    Markdown,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render a report in the requested format
pub fn generate_report(
    report: &ThirdPartyReport,
    format: ReportFormat,
    output: &OutputConfig,
) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_third_party(
            &report.licenses,
            output.group_by_license,
            output.sort_by_name,
        )),
        ReportFormat::Markdown => Ok(generate_markdown_report(report, output.sort_by_name)),
        ReportFormat::Json => generate_json_report(report),
    }
}

pub fn generate_json_report(report: &ThirdPartyReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One dependency as listed in a third-party file
pub fn dependency_line(dependency: &Dependency) -> String {
    let mut line = format!("{} ({}", dependency.display_name(), dependency.coordinates);
    if let Some(url) = dependency.url.as_deref().filter(|u| !u.is_empty()) {
        let _ = write!(line, " - {}", url);
    }
    line.push(')');
    line
}

/// Render the third-party listing of a license map
///
/// Either one section per license, or one line per dependency prefixed with
/// its licenses in parentheses.
pub fn render_third_party(map: &LicenseMap, group_by_license: bool, sort_by_name: bool) -> String {
    let dependencies = map.sorted_dependencies(sort_by_name);
    if dependencies.is_empty() {
        return "The project has no dependencies.\n".to_string();
    }

    let mut out = String::new();

    if group_by_license {
        out.push_str("List of third-party dependencies grouped by their license type.\n");
        for (license, bucket) in map.iter() {
            if bucket.is_empty() {
                continue;
            }
            let _ = write!(out, "\n    {}:\n\n", license);
            let mut members: Vec<&Dependency> = bucket.iter().collect();
            if sort_by_name {
                members.sort_by_key(|d| d.display_name().to_lowercase());
            }
            for dependency in members {
                let _ = writeln!(out, "        * {}", dependency_line(dependency));
            }
        }
        return out;
    }

    let licenses = map.to_dependency_map();
    let _ = writeln!(out, "List of {} third-party dependencies.\n", dependencies.len());
    for dependency in dependencies {
        let names = licenses
            .get(dependency)
            .map(|names| {
                names
                    .iter()
                    .map(|name| format!("({})", name))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        let _ = writeln!(out, "     {} {}", names, dependency_line(dependency));
    }
    out
}

/// Render a markdown report
pub fn generate_markdown_report(report: &ThirdPartyReport, sort_by_name: bool) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Third-Party License Report: {}\n\n", report.project_name));
    md.push_str(&format!("**Generated:** {}\n\n", report.timestamp));

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- Total dependencies: {}\n",
        report.summary.total_dependencies
    ));
    md.push_str(&format!("- Licenses: {}\n", report.summary.license_count));
    md.push_str(&format!(
        "- Dependencies without license: {}\n",
        report.summary.unsafe_count
    ));
    md.push_str(&format!(
        "- Forbidden licenses: {}\n",
        report.summary.forbidden_license_count
    ));
    md.push_str(&format!(
        "- Dependencies not in allow-list: {}\n\n",
        report.summary.unlisted_count
    ));

    md.push_str("## Dependencies\n\n");
    md.push_str("| Dependency | Name | Scope | Licenses |\n");
    md.push_str("|------------|------|-------|----------|\n");

    let licenses = report.licenses.to_dependency_map();
    for dependency in report.licenses.sorted_dependencies(sort_by_name) {
        let names = licenses
            .get(dependency)
            .map(|names| names.join(", "))
            .unwrap_or_default();
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            dependency.coordinates,
            dependency.display_name(),
            dependency.scope,
            names
        ));
    }

    if report.has_missing_licenses() {
        md.push_str("\n## Missing Licenses\n\n");
        for dependency in &report.unsafe_dependencies {
            md.push_str(&format!("- {}\n", dependency.id()));
        }
    }

    if report.has_forbidden_licenses() {
        md.push_str("\n## Forbidden Licenses\n\n");
        for license in &report.forbidden.blacklisted {
            md.push_str(&format!("- {} (excluded)\n", license));
        }
        for (license, dependencies) in &report.forbidden.not_allowed {
            md.push_str(&format!(
                "- {} (not allowed): {}\n",
                license,
                dependencies.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
    }

    if let Some(check) = report.whitelist.as_ref().filter(|c| !c.unlisted.is_empty()) {
        md.push_str("\n## Dependencies Not In Allow-list\n\n");
        for gav in &check.unlisted {
            md.push_str(&format!("- {}\n", gav));
        }
    }

    md
}

/// Count of real licenses of a map
pub fn license_count(map: &LicenseMap) -> usize {
    map.iter()
        .filter(|(name, bucket)| *name != UNKNOWN_LICENSE && !bucket.is_empty())
        .count()
}
