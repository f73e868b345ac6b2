//! BrAPI Conformance CLI
//!
//! Command-line interface for checking a live BrAPI server against its
//! OpenAPI document.

use anyhow::{bail, Context, Result};
use brapi_conformance_analyzer::{AnalysisOutcome, Analyser};
use brapi_conformance_common::{
    AuthorizationProvider, NoAuthorization, OptionsFile, StaticAuthorization,
};
use brapi_conformance_parser::{build_catalog, OpenApiParser, RequestCatalog};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brapi-conformance")]
#[command(version, about = "Check a live BrAPI server against its OpenAPI document", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the request catalog for an OpenAPI document and display it
    #[command(after_help = "EXAMPLES:\n  \
        # Show every request that would run\n  \
        brapi-conformance catalog --spec brapi_core.yaml\n\n  \
        # Apply per-entity options\n  \
        brapi-conformance catalog --spec brapi_core.yaml --options analysis.yaml")]
    Catalog {
        /// Path to the OpenAPI document (JSON or YAML)
        #[arg(short, long)]
        spec: PathBuf,

        /// Analysis options file (YAML)
        #[arg(short, long)]
        options: Option<PathBuf>,
    },

    /// Run the request catalog against a server
    #[command(after_help = "EXAMPLES:\n  \
        # Analyse every entity\n  \
        brapi-conformance analyse \\\n    \
        --spec brapi_core.yaml \\\n    \
        --base-url https://test-server.brapi.org/brapi/v2\n\n  \
        # Analyse two entities and keep a JSON report\n  \
        brapi-conformance analyse \\\n    \
        --spec brapi_core.yaml \\\n    \
        --options analysis.yaml \\\n    \
        --entity Study --entity Germplasm \\\n    \
        --json report.json")]
    Analyse {
        /// Path to the OpenAPI document (JSON or YAML)
        #[arg(short, long)]
        spec: PathBuf,

        /// Analysis options file (YAML)
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Server base URL (overrides the options file)
        #[arg(short, long)]
        base_url: Option<String>,

        /// Entity to analyse (repeatable; all entities when omitted)
        #[arg(short, long = "entity", conflicts_with = "special_only")]
        entities: Vec<String>,

        /// Only run the special requests
        #[arg(long)]
        special_only: bool,

        /// Authorization header value, e.g. "Bearer <token>"
        #[arg(long)]
        authorization: Option<String>,

        /// Write the full report as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Catalog { spec, options } => {
            catalog_command(spec.as_path(), options.as_deref(), cli.verbose)?;
        }

        Commands::Analyse {
            spec,
            options,
            base_url,
            entities,
            special_only,
            authorization,
            json,
        } => {
            let conformant = analyse_command(AnalyseConfig {
                spec_path: spec.as_path(),
                options_path: options.as_deref(),
                base_url,
                entities: &entities,
                special_only,
                authorization,
                json_output: json.as_deref(),
                verbose: cli.verbose,
            })
            .await?;

            if !conformant {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_options(options_path: Option<&Path>) -> Result<OptionsFile> {
    match options_path {
        Some(path) => {
            println!("{} Loading options: {}", "→".cyan(), path.display());
            OptionsFile::load(path).context("Failed to load analysis options")
        }
        None => Ok(OptionsFile::default()),
    }
}

fn catalog_command(spec_path: &Path, options_path: Option<&Path>, verbose: bool) -> Result<()> {
    let options = load_options(options_path)?;

    println!(
        "{} Building catalog for: {}",
        "→".cyan(),
        spec_path.display()
    );
    let (_, catalog) =
        build_catalog(spec_path, &options).context("Failed to build request catalog")?;

    println!("\n{}", "✓ Catalog built!".green().bold());
    print_catalog(&catalog, verbose);

    Ok(())
}

fn print_catalog(catalog: &RequestCatalog, verbose: bool) {
    println!("\n{}", "Special requests:".bold());
    for request in catalog.special_requests() {
        println!("  • {}", request.key().to_string().cyan());
    }

    println!("\n{}", "Entities:".bold());
    for entity_name in catalog.entity_names() {
        println!("  {}", entity_name.yellow());
        for request in catalog.entity_group(entity_name).unwrap_or_default() {
            println!(
                "    {:>2} {:<28} {}",
                request.index,
                request.name,
                request.key().to_string().cyan()
            );
            if verbose {
                for prerequisite in &request.prerequisites {
                    println!("         after {prerequisite}");
                }
                for variable in &request.cache_variables {
                    println!(
                        "         caches {} from {}",
                        variable.variable_name, variable.json_path
                    );
                }
            }
        }
    }

    println!("\n{}", "Summary:".bold());
    println!("  Requests: {}", catalog.len());
    println!("  Skipped by options: {}", catalog.skipped().len());
    println!("  Unmatched endpoints: {}", catalog.unmatched().len());

    if verbose {
        for endpoint in catalog.skipped() {
            println!(
                "  {} skipped {} {}",
                "-".dimmed(),
                endpoint.method,
                endpoint.path
            );
        }
        for endpoint in catalog.unmatched() {
            println!(
                "  {} unmatched {} {}",
                "?".yellow(),
                endpoint.method,
                endpoint.path
            );
        }
    }

    if !catalog.errors().is_empty() {
        println!("\n{}", "Errors:".red().bold());
        for error in catalog.errors().iter() {
            println!("  {} {}", "✗".red(), error);
        }
    }
}

/// Configuration for the analyse command
struct AnalyseConfig<'a> {
    spec_path: &'a Path,
    options_path: Option<&'a Path>,
    base_url: Option<String>,
    entities: &'a [String],
    special_only: bool,
    authorization: Option<String>,
    json_output: Option<&'a Path>,
    verbose: bool,
}

/// Returns whether the server conformed
async fn analyse_command(config: AnalyseConfig<'_>) -> Result<bool> {
    let mut options = load_options(config.options_path)?;
    if let Some(base_url) = config.base_url {
        options = options.with_base_url(base_url);
    }

    println!(
        "{} Loading OpenAPI document: {}",
        "→".cyan(),
        config.spec_path.display()
    );
    let parser =
        OpenApiParser::from_file(config.spec_path).context("Failed to load OpenAPI document")?;

    let authorization: Box<dyn AuthorizationProvider> = match config.authorization {
        Some(value) => Box::new(
            StaticAuthorization::new(value).context("Invalid authorization value")?,
        ),
        None => Box::new(NoAuthorization),
    };

    let analyser =
        Analyser::new(&parser, &options, authorization).context("Failed to prepare analysis")?;

    if config.verbose {
        println!("  Requests: {}", analyser.catalog().len());
        println!("  Entities: {}", analyser.catalog().entity_names().count());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing current request");
            on_interrupt.cancel();
        }
    });

    println!("{} Analysing server...", "→".cyan());
    let outcome = if config.special_only {
        analyser.analyse_special(cancel).await
    } else if config.entities.is_empty() {
        analyser.analyse_all(cancel).await
    } else {
        analyser
            .analyse_entities(config.entities, cancel)
            .await
            .context("Failed to select entities")?
    };

    print_outcome(&outcome)?;

    if let Some(path) = config.json_output {
        outcome
            .write_json(path)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;
        println!("{} Report written to {}", "✓".green(), path.display());
    }

    Ok(outcome.summary().is_conformant())
}

fn print_outcome(outcome: &AnalysisOutcome) -> Result<()> {
    let text = outcome.to_text().context("Failed to render report")?;
    println!("\n{text}");

    let summary = outcome.summary();
    let verdict = summary.verdict();
    let verdict = if summary.is_conformant() {
        verdict.green().bold()
    } else if outcome.cancelled {
        verdict.yellow().bold()
    } else {
        verdict.red().bold()
    };
    println!("{} {}", "Verdict:".bold(), verdict);

    if outcome.reports.is_empty() && !outcome.cancelled {
        bail!("No requests were executed");
    }

    Ok(())
}
