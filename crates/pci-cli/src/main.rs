use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pci_core::{
    render_score_sheet, AggregationPolicy, Classification, Config, PciReport, ResultMatrix, ScoringEngine, Severity,
};
use pci_probe::{PostgresSession, ProbeOutcome, ProbeRegistry, ProbeRunner, SqlSession};

/// PCI - PostgreSQL Compatibility Index
#[derive(Parser)]
#[command(name = "pci")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: pci.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a live database and score it
    Run {
        /// Output file for the JSON report (default: run.report from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also output markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,

        /// Aggregation policy (penalty or normalized)
        #[arg(short, long)]
        policy: Option<AggregationPolicy>,
    },

    /// Score a result matrix or a saved report
    Score {
        /// JSON file with a result matrix or a full report
        input: PathBuf,

        /// Where to write the score sheet
        output: PathBuf,

        /// Aggregation policy (penalty or normalized)
        #[arg(short, long)]
        policy: Option<AggregationPolicy>,
    },

    /// Print the feature catalogue and its weights
    Catalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Run { output, markdown, policy } => {
            run_command(&config, output, markdown.as_deref(), policy, cli.verbose).await
        }
        Commands::Score { input, output, policy } => score_command(&config, &input, &output, policy),
        Commands::Catalog => catalog_command(&config),
    }
}

/// Logs go to stderr so stdout stays clean for the summary
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else if Path::new("pci.toml").exists() {
        Config::from_file(Path::new("pci.toml")).context("Failed to load pci.toml")?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    config.with_env_overrides().context("Invalid PG_* environment variable")
}

/// Run command - probe the configured database
async fn run_command(
    config: &Config,
    output: Option<PathBuf>,
    markdown: Option<&Path>,
    policy: Option<AggregationPolicy>,
    verbose: bool,
) -> Result<()> {
    let catalog = config.scoring.build_catalog().context("Invalid scoring configuration")?;
    let policy = policy.unwrap_or(config.scoring.policy);
    let registry = ProbeRegistry::standard();
    let runner = ProbeRunner::new(&catalog, &registry, config.run.scratch_schema.as_str())?;

    if verbose {
        eprintln!("{} {}", "Connecting to".cyan(), config.connection.describe());
    }

    let session = PostgresSession::connect(&config.connection)
        .await
        .with_context(|| format!("Failed to connect to {}", config.connection.describe()))?;

    let server_version = match session.server_version().await {
        Ok(version) => version,
        Err(e) => {
            tracing::debug!(error = %e, "could not read server version");
            None
        }
    };

    if verbose {
        eprintln!(
            "{} {} probes in schema {}...",
            "Running".cyan(),
            catalog.probe_count(),
            runner.scratch_schema()
        );
    }

    let results = runner
        .run_all_with(&session, |category, sub_feature, outcome| {
            if verbose {
                print_probe_line(category, sub_feature, outcome);
            }
        })
        .await
        .context("Probe run aborted")?;

    let card = ScoringEngine::new(&catalog, policy)
        .score(&results.matrix)
        .context("Probe run produced an incomplete result matrix")?;

    let report = PciReport::new(card, results.matrix)
        .with_diagnostics(results.diagnostics)
        .with_metadata(json!({
            "session": session.name(),
            "target": session.target(),
            "server_version": server_version,
            "scratch_schema": runner.scratch_schema(),
        }));

    let output = output.unwrap_or_else(|| config.run.report.clone());
    report
        .save_to_file(&output)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    print_report_summary(&report, verbose);

    if let Some(md_path) = markdown {
        std::fs::write(md_path, generate_markdown_report(&report))
            .with_context(|| format!("Failed to write markdown report to {}", md_path.display()))?;
        println!("{} {}", "Markdown report saved to".green(), md_path.display());
    }

    println!("{} {}", "PCI testing completed. Report saved to".green(), output.display());

    Ok(())
}

fn print_probe_line(category: &str, sub_feature: &str, outcome: &ProbeOutcome) {
    let verdict = match outcome.classification {
        Classification::Full => "full".green(),
        Classification::Partial => "partial".yellow(),
        Classification::No => "no".red(),
    };
    eprintln!("  {} / {}: {}", category, sub_feature, verdict);
}

/// Score command - standalone scorer
fn score_command(config: &Config, input: &Path, output: &Path, policy: Option<AggregationPolicy>) -> Result<()> {
    let catalog = config.scoring.build_catalog().context("Invalid scoring configuration")?;
    let policy = policy.unwrap_or(config.scoring.policy);

    let text = std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let document: Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", input.display()))?;

    let matrix = ResultMatrix::from_document(scoring_input(&document), &catalog)
        .with_context(|| format!("Invalid result matrix in {}", input.display()))?;

    let card = ScoringEngine::new(&catalog, policy).score(&matrix)?;

    let sheet = render_score_sheet(card.pci_score, &document)?;
    std::fs::write(output, sheet).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("PCI Score: {:.2}%", card.pci_score);
    println!("Detailed report saved to {}", output.display());

    Ok(())
}

/// The matrix to score: a report's `details`, or the document itself
fn scoring_input(document: &Value) -> &Value {
    match document.get("details") {
        Some(details) if details.is_object() && document.get("pci_score").is_some() => details,
        _ => document,
    }
}

/// Catalog command - print categories, weights and sub-features
fn catalog_command(config: &Config) -> Result<()> {
    let catalog = config.scoring.build_catalog().context("Invalid scoring configuration")?;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "PCI Feature Catalogue".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    let rows: Vec<Vec<String>> = catalog
        .entries()
        .iter()
        .map(|category| {
            vec![
                category.name.clone(),
                format_number(category.weight),
                category.sub_features.join(", "),
            ]
        })
        .collect();
    print!("{}", render_grid(&["Category", "Weight", "Sub-features"], &rows));

    println!();
    println!("Probes: {}", catalog.probe_count());
    println!("Total weight: {}", format_number(catalog.total_weight()));
    println!("Penalty per failure: {}", format_number(catalog.penalty_per_failure()));
    println!("Policy: {}", config.scoring.policy);
    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Render rows as a bordered text table with a `=` rule under the header
fn render_grid(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let rule = |fill: char| -> String {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&fill.to_string().repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let line = |cells: Vec<&str>| -> String {
        let mut out = String::from("|");
        for (cell, width) in cells.iter().zip(&widths) {
            let pad = width - cell.chars().count();
            out.push_str(&format!(" {}{} |", cell, " ".repeat(pad)));
        }
        out.push('\n');
        out
    };

    let mut grid = rule('-');
    grid.push_str(&line(headers.to_vec()));
    grid.push_str(&rule('='));
    for row in rows {
        grid.push_str(&line(row.iter().map(String::as_str).collect()));
        grid.push_str(&rule('-'));
    }
    grid
}

/// Print report summary to stdout
fn print_report_summary(report: &PciReport, verbose: bool) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "PCI Summary Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    let score = format!("{:.2}%", report.pci_score);
    let score = if report.pci_score >= 90.0 {
        score.green().bold()
    } else if report.pci_score >= 70.0 {
        score.yellow().bold()
    } else {
        score.red().bold()
    };
    println!("Overall PCI Score: {}", score);
    println!("Policy: {}", report.policy);
    println!("Timestamp: {}", report.timestamp);
    println!();

    if report.failed.is_empty() {
        println!("{}", "✓ All features passed successfully!".green().bold());
    } else {
        println!("{}", "Failed Features:".bold());
        println!();
        let rows: Vec<Vec<String>> = report
            .failed
            .iter()
            .map(|f| vec![f.category.clone(), f.sub_feature.clone()])
            .collect();
        print!("{}", render_grid(&["Category", "Feature"], &rows));
    }

    if verbose && !report.categories.is_empty() {
        println!();
        println!("{}", "Categories:".bold());
        let rows: Vec<Vec<String>> = report
            .categories
            .iter()
            .map(|c| {
                vec![
                    c.category.clone(),
                    format!("{:.0}%", c.percentage * 100.0),
                    format_number(c.weight),
                    format!("{:.2}", c.weighted),
                ]
            })
            .collect();
        print!("{}", render_grid(&["Category", "Support", "Weight", "Points"], &rows));
    }

    let shown: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity == Severity::Error)
        .collect();

    if !shown.is_empty() {
        println!();
        println!("{}", "Diagnostics:".bold());
        for diag in shown {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!(
                "  [{}] {} / {} ({}): {}",
                severity_str,
                diag.category,
                diag.sub_feature,
                diag.kind.as_str(),
                diag.message
            );
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Generate markdown report
fn generate_markdown_report(report: &PciReport) -> String {
    let mut md = String::new();

    md.push_str("# PostgreSQL Compatibility Index Report\n\n");
    md.push_str(&format!("**Score:** {:.2}%\n\n", report.pci_score));
    md.push_str(&format!("**Policy:** {}\n\n", report.policy));
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.timestamp));

    if let Some(target) = report.metadata.as_ref().and_then(|m| m.get("target")).and_then(Value::as_str) {
        md.push_str(&format!("**Target:** {}\n\n", target));
    }

    if !report.categories.is_empty() {
        md.push_str("## Categories\n\n");
        md.push_str("| Category | Support | Weight | Points |\n");
        md.push_str("|---|---|---|---|\n");
        for c in &report.categories {
            md.push_str(&format!(
                "| {} | {:.0}% | {} | {:.2} |\n",
                c.category,
                c.percentage * 100.0,
                format_number(c.weight),
                c.weighted
            ));
        }
        md.push('\n');
    }

    if report.failed.is_empty() {
        md.push_str("✅ **All features passed!**\n");
    } else {
        md.push_str("## Failed Features\n\n");
        md.push_str("| Category | Feature |\n");
        md.push_str("|---|---|\n");
        for failed in &report.failed {
            md.push_str(&format!("| {} | {} |\n", failed.category, failed.sub_feature));
        }
        md.push('\n');
    }

    if !report.diagnostics.is_empty() {
        md.push_str("## Diagnostics\n\n");

        for diag in &report.diagnostics {
            let severity_emoji = match diag.severity {
                Severity::Error => "❌",
                Severity::Warn => "⚠️",
                Severity::Info => "ℹ️",
            };

            md.push_str(&format!(
                "### {} {} / {} - {}\n\n",
                severity_emoji,
                diag.category,
                diag.sub_feature,
                diag.kind.as_str()
            ));
            md.push_str(&format!("**Classification:** {}\n\n", diag.classification));
            md.push_str(&format!("{}\n\n", diag.message));
        }
    }

    md
}
