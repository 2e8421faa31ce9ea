//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use contractsync_core::{IngestOutcome, RunConfig, check_status, sync_contracts};
use contractsync_fetch::{ContractsApi, RetryPolicy};
use contractsync_shared::{AppConfig, ProgressReporter, init_config, load_config};
use contractsync_storage::RecordStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// contractsync — mirror the DOGE contracts API and enrich it from FPDS.
#[derive(Parser)]
#[command(
    name = "contractsync",
    version,
    about = "Sync cancelled-contract savings records and enrich them from FPDS detail pages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sync, clean, enrich, and export.
    Run {
        /// Concurrent detail-page lookups.
        #[arg(short, long)]
        workers: Option<usize>,

        /// Output CSV path.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Raw record store path.
        #[arg(long)]
        raw: Option<PathBuf>,

        /// Export without detail-page lookups.
        #[arg(long)]
        skip_enrich: bool,
    },
    /// Bring the raw record store up to date with the API.
    Sync {
        /// Raw record store path.
        #[arg(long)]
        raw: Option<PathBuf>,
    },
    /// Compare the remote total with the local row count.
    Status,
    /// Manage configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` wins when set.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contractsync=info",
        1 => "contractsync=debug",
        _ => "contractsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            workers,
            out,
            raw,
            skip_enrich,
        } => cmd_run(workers, out, raw, skip_enrich).await,
        Command::Sync { raw } => cmd_sync(raw).await,
        Command::Status => cmd_status().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Load the config file and apply flag overrides on top.
fn resolve_config(
    workers: Option<usize>,
    out: Option<PathBuf>,
    raw: Option<PathBuf>,
) -> Result<AppConfig> {
    let mut config = load_config().wrap_err("failed to load configuration")?;

    if let Some(workers) = workers {
        config.enrichment.workers = workers;
    }
    if let Some(out) = out {
        config.paths.output_csv = out;
    }
    if let Some(raw) = raw {
        config.paths.raw_csv = raw;
    }

    config.validate()?;
    Ok(config)
}

async fn cmd_run(
    workers: Option<usize>,
    out: Option<PathBuf>,
    raw: Option<PathBuf>,
    skip_enrich: bool,
) -> Result<()> {
    let settings = resolve_config(workers, out, raw)?;
    info!(
        endpoint = %settings.api.endpoint,
        workers = settings.enrichment.workers,
        skip_enrich,
        "starting run"
    );

    let config = RunConfig {
        settings,
        skip_enrich,
    };

    let reporter = CliProgress::new();
    let result = contractsync_core::run(&config, &reporter).await;
    reporter.finish();
    let summary = result?;

    println!();
    println!("  Run complete");
    println!("  Remote total: {}", summary.ingest.remote_total);
    println!("  Sync:         {}", describe_outcome(&summary.ingest.outcome));
    println!("  Rows kept:    {}", summary.rows_cleaned);
    println!(
        "  Enriched:     {}/{}",
        summary.enrichment.enriched, summary.enrichment.dispatched
    );
    println!("  Output:       {}", summary.output_path.display());
    println!("  Time:         {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_sync(raw: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(None, None, raw)?;
    let api = ContractsApi::new(&config.api, RetryPolicy::from(&config.retry))?;
    let store = RecordStore::new(&config.paths.raw_csv);

    let reporter = CliProgress::new();
    let result = sync_contracts(&api, &store, &reporter).await;
    reporter.finish();
    let report = result?;

    println!("Remote total: {}", report.remote_total);
    println!("Local before: {}", report.local_before);
    println!("Sync:         {}", describe_outcome(&report.outcome));
    println!("Store:        {}", store.path().display());
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = resolve_config(None, None, None)?;
    let api = ContractsApi::new(&config.api, RetryPolicy::from(&config.retry))?;
    let store = RecordStore::new(&config.paths.raw_csv);

    let status = check_status(&api, &store).await?;

    println!("Remote total: {}", status.remote_total);
    println!("Local rows:   {}", status.local_count);
    println!("Store:        {}", store.path().display());
    if status.is_current() {
        println!("Up to date.");
    } else {
        println!("Out of date: the next sync will refetch every page.");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn describe_outcome(outcome: &IngestOutcome) -> String {
    match outcome {
        IngestOutcome::UpToDate => "already up to date".to_string(),
        IngestOutcome::Refreshed {
            pages_requested,
            failed_pages: 0,
            records_written,
        } => format!("refreshed, {records_written} records from {pages_requested} pages"),
        IngestOutcome::Refreshed {
            pages_requested,
            failed_pages,
            records_written,
        } => format!(
            "refreshed, {records_written} records from {pages_requested} pages ({failed_pages} lost)"
        ),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_done(&self, page: u32, total_pages: u32, records_so_far: u64) {
        self.spinner.set_message(format!(
            "Fetching pages [{page}/{total_pages}] {records_so_far} records"
        ));
    }

    fn row_enriched(&self, done: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching from detail pages [{done}/{total}]"));
    }
}
