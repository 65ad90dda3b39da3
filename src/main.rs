//! Catalog Harvester main entry point
//!
//! This is the command-line interface for harvesting a CONTENTdm catalog.

use anyhow::Context;
use catalog_harvester::config::{
    compute_config_hash, load_config, validate, Backend, Config,
};
use catalog_harvester::crawler::{CrawlController, ValidationReport};
use catalog_harvester::output::{
    generate_markdown_summary, print_statistics, print_validation_report, RunStatistics,
};
use catalog_harvester::session::open_session;
use catalog_harvester::state::CrawlSession;
use catalog_harvester::storage::{
    load_failure_file, load_records_file, open_stores, retry_records_path,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// Catalog Harvester: a resilient crawler for JavaScript-rendered digital library catalogs
///
/// Walks the paginated listing of a collection, visits every item page through
/// one browser session, and writes the extracted metadata as JSON records.
/// Entries that cannot be extracted are written to a failure file that the
/// `retry` command can reprocess later.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(version)]
#[command(about = "A resilient catalog metadata harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Page loading backend
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// Show the browser window (chrome backend)
    #[arg(long, global = true)]
    headed: bool,

    /// Retries after the first attempt, per page and per entry
    #[arg(long, value_name = "N", global = true)]
    max_retries: Option<u32>,

    /// Delay between two attempts
    #[arg(long, value_name = "MS", global = true)]
    retry_delay_ms: Option<u64>,

    /// Maximum number of entries taken from each listing page
    #[arg(long, value_name = "N", global = true)]
    per_page_cap: Option<usize>,

    /// Records output file
    #[arg(long, value_name = "PATH", global = true)]
    records: Option<PathBuf>,

    /// Failures output file
    #[arg(long, value_name = "PATH", global = true)]
    failures: Option<PathBuf>,

    /// Failures a run may produce and still exit successfully
    #[arg(long, value_name = "N", global = true)]
    failure_tolerance: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest a single listing page
    Page {
        #[arg(value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },

    /// Harvest every listing page from START to END
    Range {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        start: u32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        end: u32,
    },

    /// Count the entries of each page without extracting anything
    Validate {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        start: u32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        end: u32,
    },

    /// Re-attempt the URLs of a failure file
    Retry {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// ID given to the first recovered entry
        #[arg(long, value_name = "N")]
        first_id: Option<u64>,
    },

    /// Show field coverage of a records file and exit
    Stats {
        #[arg(value_name = "RECORDS")]
        records: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Http,
    Chrome,
}

/// What a finished run produced
enum RunResult {
    Harvest(CrawlSession),
    Validation(ValidationReport),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if let Command::Stats { records } = &cli.command {
        handle_stats(records)?;
        return Ok(ExitCode::SUCCESS);
    }

    let (config, config_hash) = load_effective_config(&cli)?;
    run(cli, config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvester=info,warn"),
            1 => EnvFilter::new("catalog_harvester=debug,info"),
            2 => EnvFilter::new("catalog_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (or defaults), applies CLI overrides and validates
fn load_effective_config(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            let hash = compute_config_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => (Config::default(), "defaults".to_string()),
    };

    if let Some(backend) = cli.backend {
        config.browser.backend = match backend {
            BackendArg::Http => Backend::Http,
            BackendArg::Chrome => Backend::Chrome,
        };
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(max_retries) = cli.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(delay) = cli.retry_delay_ms {
        config.retry.retry_delay_ms = delay;
    }
    if let Some(cap) = cli.per_page_cap {
        config.crawl.per_page_cap = Some(cap);
    }
    if let Some(tolerance) = cli.failure_tolerance {
        config.crawl.failure_tolerance = tolerance;
    }
    if let Some(failures) = &cli.failures {
        config.output.failures_path = failures.display().to_string();
    }

    if let Command::Retry { first_id, .. } = &cli.command {
        if let Some(first_id) = first_id {
            config.crawl.first_id = *first_id;
        }
        if cli.records.is_none() {
            let path = retry_records_path(Path::new(&config.output.records_path));
            config.output.records_path = path.display().to_string();
        }
    }
    if let Some(records) = &cli.records {
        config.output.records_path = records.display().to_string();
    }

    validate(&config).context("Invalid configuration")?;
    Ok((config, hash))
}

async fn run(cli: Cli, config: Config, config_hash: String) -> anyhow::Result<ExitCode> {
    // A bad failure file aborts before any browser is started
    let failures = match &cli.command {
        Command::Retry { file, .. } => Some(load_failure_file(file)?),
        _ => None,
    };

    let browser = open_session(&config.browser)
        .await
        .context("Failed to open browser session")?;
    let mut controller = CrawlController::from_config(&config, browser)?;
    if !matches!(cli.command, Command::Validate { .. }) {
        for store in open_stores(&config, &config_hash)? {
            controller.add_store(store);
        }
    }

    let outcome = tokio::select! {
        result = execute(&mut controller, &cli.command, failures) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    if let Err(e) = controller.shutdown().await {
        tracing::warn!("Browser session did not shut down cleanly: {}", e);
    }

    let Some(result) = outcome else {
        tracing::warn!("Interrupted; the last flushed records stand");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    };

    match result? {
        RunResult::Harvest(session) => report_harvest(&config, &session),
        RunResult::Validation(report) => {
            print_validation_report(&report);
            if report.has_data() {
                Ok(ExitCode::SUCCESS)
            } else {
                tracing::error!("No listing page in the range produced any links");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

async fn execute(
    controller: &mut CrawlController,
    command: &Command,
    failures: Option<Vec<catalog_harvester::FailureRecord>>,
) -> catalog_harvester::Result<RunResult> {
    let result = match command {
        Command::Page { page } => RunResult::Harvest(controller.run_page(*page).await?),
        Command::Range { start, end } => {
            RunResult::Harvest(controller.run_range(*start, *end).await?)
        }
        Command::Validate { start, end } => {
            RunResult::Validation(controller.validate(*start, *end).await?)
        }
        Command::Retry { file, .. } => {
            let failures = failures.unwrap_or_default();
            RunResult::Harvest(controller.retry_failures(failures, file.clone()).await?)
        }
        Command::Stats { .. } => unreachable!("stats is handled before a session is opened"),
    };
    Ok(result)
}

fn report_harvest(config: &Config, session: &CrawlSession) -> anyhow::Result<ExitCode> {
    let stats = RunStatistics::from_session(session);
    print_statistics(&stats);

    if let Some(summary_path) = &config.output.summary_path {
        generate_markdown_summary(session, Path::new(summary_path))
            .with_context(|| format!("Failed to write summary {}", summary_path))?;
        println!("\n✓ Summary written to: {}", summary_path);
    }

    let tolerance = config.crawl.failure_tolerance;
    if session.failures().len() > tolerance {
        tracing::error!(
            "{} failure(s) exceed the tolerance of {}; see {}",
            session.failures().len(),
            tolerance,
            config.output.failures_path
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Handles the stats command: field coverage of a records file
fn handle_stats(records: &Path) -> anyhow::Result<()> {
    println!("Records: {}\n", records.display());
    let loaded = load_records_file(records)?;
    print_statistics(&RunStatistics::from_records(&loaded, &[]));
    Ok(())
}
