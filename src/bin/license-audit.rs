//! CLI tool for third-party license resolution

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use thirdparty_license_audit::{
    audit_aggregate, audit_project, generate_report, CargoGraph, DependencyGraphProvider,
    FailurePolicy, ReportFormat, StaticGraph, ThirdPartyConfig, ThirdPartyReport,
    UNKNOWN_LICENSE,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "license-audit")]
#[command(about = "Resolve and check the third-party licenses of a project's dependencies", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the Cargo project to audit
    #[arg(short = 'p', long, default_value = ".")]
    project_path: PathBuf,

    /// Dependency graph manifest (TOML or JSON) to audit instead of the Cargo
    /// project; several manifests are audited as one aggregate
    #[arg(short = 'g', long = "graph")]
    graphs: Vec<PathBuf>,

    /// Path to custom configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve licenses and display summary
    Scan {
        /// Display the licenses of each dependency
        #[arg(long)]
        detailed: bool,

        /// Never write the missing file
        #[arg(long)]
        no_write: bool,
    },

    /// Generate third-party report
    Report {
        /// Output format (text, markdown, json)
        #[arg(short = 'f', long, default_value = "text")]
        format: ReportFormat,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Group the listing by license
        #[arg(long)]
        group_by_license: bool,

        /// Order dependencies by name
        #[arg(long)]
        sort_by_name: bool,
    },

    /// Check licenses against the configured policy (exit code based)
    Check {
        /// Fail when a dependency has no license
        #[arg(long)]
        fail_on_missing: bool,

        /// Fail when a forbidden license is used
        #[arg(long)]
        fail_on_blacklist: bool,

        /// Fail when a dependency is not in the allow-list
        #[arg(long)]
        fail_on_not_whitelisted: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        match ThirdPartyConfig::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{} Failed to load config: {}", "Error:".red().bold(), e);
                process::exit(1);
            }
        }
    } else {
        ThirdPartyConfig::default()
    };

    if config.missing.missing_file.is_relative() {
        config.missing.missing_file = cli.project_path.join(&config.missing.missing_file);
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Resolving licenses...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = run_audit(&cli, &config).await;

    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} License resolution failed: {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    // Handle subcommand
    match cli.command {
        Commands::Scan { detailed, no_write } => {
            display_summary(&report);

            if detailed {
                println!();
                display_detailed(&report);
            }

            if let Some(update) = report.missing_file.as_ref().filter(|u| u.regenerate) {
                if no_write {
                    println!(
                        "\nMissing file {} is out of date",
                        update.path.display().to_string().yellow()
                    );
                } else if let Err(e) = update.store(&report.licenses) {
                    eprintln!("{} Failed to write missing file: {}", "Error:".red().bold(), e);
                    process::exit(1);
                } else {
                    println!("\nMissing file written to: {}", update.path.display());
                }
            }
        }

        Commands::Report {
            format,
            output,
            group_by_license,
            sort_by_name,
        } => {
            let mut output_config = config.output.clone();
            output_config.group_by_license |= group_by_license;
            output_config.sort_by_name |= sort_by_name;

            let content = match generate_report(&report, format, &output_config) {
                Ok(content) => content,
                Err(e) => {
                    eprintln!("{} Failed to render report: {}", "Error:".red().bold(), e);
                    process::exit(1);
                }
            };

            if let Some(output_path) = output {
                match std::fs::write(&output_path, content) {
                    Ok(_) => println!("Report written to: {}", output_path.display()),
                    Err(e) => {
                        eprintln!("{} Failed to write report: {}", "Error:".red().bold(), e);
                        process::exit(1);
                    }
                }
            } else {
                println!("{}", content);
            }
        }

        Commands::Check {
            fail_on_missing,
            fail_on_blacklist,
            fail_on_not_whitelisted,
        } => {
            let policy = FailurePolicy {
                fail_on_missing: config.failure.fail_on_missing || fail_on_missing,
                fail_on_blacklist: config.failure.fail_on_blacklist || fail_on_blacklist,
                fail_on_not_whitelisted_dependency: config
                    .failure
                    .fail_on_not_whitelisted_dependency
                    || fail_on_not_whitelisted,
                fail_if_warning: config.failure.fail_if_warning,
            };

            let failures = policy.failures(&report);

            if !failures.is_empty() {
                eprintln!("{} {} check failures:", "Failed:".red().bold(), failures.len());
                for failure in failures {
                    eprintln!("  - {}", failure);
                }
                process::exit(1);
            } else {
                println!("{} All checks passed!", "Success:".green().bold());
            }
        }
    }
}

async fn run_audit(cli: &Cli, config: &ThirdPartyConfig) -> anyhow::Result<ThirdPartyReport> {
    let report = match cli.graphs.as_slice() {
        [] => {
            let graph = CargoGraph::load(&cli.project_path).with_context(|| {
                format!("Failed to read cargo metadata of {}", cli.project_path.display())
            })?;
            audit_project(&graph, config).await?
        }
        [single] => {
            let graph = load_graph(single)?;
            audit_project(&graph, config).await?
        }
        many => {
            let graphs = many
                .iter()
                .map(|path| load_graph(path))
                .collect::<Result<Vec<_>, _>>()?;
            let providers: Vec<&dyn DependencyGraphProvider> =
                graphs.iter().map(|g| g as &dyn DependencyGraphProvider).collect();
            audit_aggregate("aggregate", &providers, config).await?
        }
    };
    Ok(report)
}

fn load_graph(path: &Path) -> anyhow::Result<StaticGraph> {
    info!("Loading dependency graph from {}", path.display());
    StaticGraph::from_path(path)
        .with_context(|| format!("Failed to load dependency graph {}", path.display()))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn display_summary(report: &ThirdPartyReport) {
    println!("\n{}", "=== License Summary ===".bold());
    println!("Project: {}", report.project_name.cyan());
    println!("Total dependencies: {}", report.summary.total_dependencies);
    println!("Licenses: {}", report.summary.license_count);
    println!();

    for (license, bucket) in report.licenses.iter() {
        if bucket.is_empty() {
            continue;
        }
        let line = format!("{}: {}", license, bucket.len());
        if license == UNKNOWN_LICENSE {
            println!("  {} {}", "●".red(), line.red());
        } else if report.forbidden.unsafe_licenses().contains(license) {
            println!("  {} {}", "●".yellow(), line.yellow());
        } else {
            println!("  {} {}", "●".green(), line);
        }
    }
    println!();

    println!(
        "Dependencies without license: {}",
        report.summary.unsafe_count
    );
    println!(
        "Forbidden licenses: {}",
        report.summary.forbidden_license_count
    );
    if report.whitelist.is_some() {
        println!(
            "Dependencies not in allow-list: {}",
            report.summary.unlisted_count
        );
    }
}

fn display_detailed(report: &ThirdPartyReport) {
    println!("{}", "=== Detailed Results ===".bold());

    for (dependency, licenses) in report.licenses.to_dependency_map() {
        println!(
            "\n{} {} [{}]",
            dependency.display_name().bold(),
            dependency.coordinates,
            dependency.scope
        );
        for license in licenses {
            if license == UNKNOWN_LICENSE {
                println!("  License: {}", license.red());
            } else {
                println!("  License: {}", license);
            }
        }
    }
}
