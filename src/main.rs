//! Schema-Crawler main entry point
//!
//! This is the command-line interface for running a crawl job file.

use anyhow::{bail, Context};
use clap::Parser;
use schema_crawler::config::{load_config_with_hash, parse_mode, validate, JobConfig};
use schema_crawler::crawler::{Crawler, HttpFetcher, Mode};
use schema_crawler::pagination::page_urls;
use schema_crawler::schema::{PaginationSpec, Schema};
use schema_crawler::ConfigError;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Schema-Crawler: declarative record extraction from web pages
///
/// Reads a TOML job file describing a start URL, an extraction schema and an
/// optional pagination strategy, crawls it and prints one JSON record per
/// line on stdout.
#[derive(Parser, Debug)]
#[command(name = "schema-crawler")]
#[command(version)]
#[command(about = "Declarative schema-driven web extraction", long_about = None)]
struct Cli {
    /// Path to TOML job file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Override the job's start URL
    #[arg(long)]
    url: Option<String>,

    /// Override the execution mode (single, sequential, concurrent)
    #[arg(long)]
    mode: Option<String>,

    /// Override the concurrency bound of concurrent mode
    #[arg(long)]
    max_parallel: Option<u32>,

    /// Validate the job and show the pages that would be fetched
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate the job
    tracing::info!("Loading job from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Job loaded successfully (hash: {})", hash);

    apply_overrides(&mut config, &cli)?;
    let schema = config.to_schema()?;
    let mode = parse_mode(&config.crawl.mode, config.crawl.max_parallel)?;

    if let Some(pagination) = schema.pagination.as_ref().filter(|p| p.is_interactive()) {
        return Err(ConfigError::Unsupported(format!(
            "{} pagination needs a browser driver, which the command line does not provide",
            pagination.name()
        ))
        .into());
    }

    if cli.dry_run {
        handle_dry_run(&config, &schema, mode)
    } else {
        handle_crawl(&config, &schema, mode).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(log_directives(verbose, quiet)));

    // Records go to stdout, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .without_time()
        .init();
}

/// Overrides the `-v`/`--quiet` filter when set
const LOG_ENV: &str = "SCHEMA_CRAWLER_LOG";

/// Filter directives for a verbosity level
///
/// The HTTP stack stays at `warn` below `-vv`.
fn log_directives(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "schema_crawler=error";
    }
    match verbose {
        0 => "schema_crawler=info,reqwest=warn,hyper=warn",
        1 => "schema_crawler=debug,reqwest=warn,hyper=warn",
        2 => "schema_crawler=trace,reqwest=debug,hyper=info",
        _ => "trace",
    }
}

/// Applies command-line overrides and re-validates the job
fn apply_overrides(config: &mut JobConfig, cli: &Cli) -> anyhow::Result<()> {
    if let Some(url) = &cli.url {
        config.crawl.url = url.clone();
    }
    if let Some(mode) = &cli.mode {
        config.crawl.mode = mode.clone();
    }
    if let Some(max_parallel) = cli.max_parallel {
        config.crawl.max_parallel = max_parallel;
    }
    validate(config)?;
    Ok(())
}

/// Handles the --dry-run mode: validates the job and shows what would be fetched
fn handle_dry_run(config: &JobConfig, schema: &Schema, mode: Mode) -> anyhow::Result<()> {
    println!("=== Schema-Crawler Dry Run ===\n");

    println!("Crawl:");
    println!("  Start URL: {}", config.crawl.url);
    println!("  Mode: {}", mode.as_str());
    if let Mode::Concurrent { max_parallel } = mode {
        println!("  Max parallel: {}", max_parallel);
    }
    println!("  Field failure: {}", config.crawl.field_failure);
    println!("  Fetch failure: {}", config.crawl.fetch_failure);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s (connect {}s)", config.http.timeout_secs, config.http.connect_timeout_secs);

    println!("\nSchema ({} fields per '{}'):", schema.fields.len(), schema.base_selector);
    for field in &schema.fields {
        println!(
            "  - {} ({}){}",
            field.name,
            field.field_type.as_str(),
            if field.follow_schema.is_some() { " -> follows link" } else { "" }
        );
    }

    let pages = match (&schema.pagination, mode) {
        (Some(PaginationSpec::UrlTemplate(spec)), Mode::Sequential | Mode::Concurrent { .. }) => {
            page_urls(&config.crawl.url, spec)?
                .into_iter()
                .map(String::from)
                .collect()
        }
        _ => vec![config.crawl.url.clone()],
    };

    println!("\nPages ({}):", pages.len());
    for page in &pages {
        println!("  * {}", page);
    }

    println!("\n✓ Job is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &JobConfig, schema: &Schema, mode: Mode) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::from_config(&config.http)?;
    let crawler = Crawler::new(fetcher).with_options(config.crawl_options()?);

    let outcome = crawler.fetch(&config.crawl.url, schema, mode).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &outcome.records {
        serde_json::to_writer(&mut out, record)?;
        writeln!(out)?;
    }
    out.flush()?;

    for error in &outcome.errors {
        tracing::warn!("Skipped page: {}", error);
    }
    tracing::info!(
        "{} records from {} pages ({})",
        outcome.records.len(),
        outcome.pages,
        outcome.stop
    );

    if let Some(error) = outcome.error {
        bail!("crawl stopped early: {}", error);
    }
    Ok(())
}
