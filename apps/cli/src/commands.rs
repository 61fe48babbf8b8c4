//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::info;

use leadscout_core::{CompanyRun, ProgressReporter, RunOutcome, build_collaborators, run_all};
use leadscout_ledger::{LeadTable, Ledger, TIMESTAMP_FORMAT, open_ledger, parse_candidates};
use leadscout_shared::{AppConfig, CompanyTarget, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// leadscout: find and notify new sales leads from public signals.
#[derive(Parser)]
#[command(
    name = "leadscout",
    version,
    about = "Find new sales leads in public company signals and notify each one exactly once.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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
    /// Run the lead pipeline for configured companies.
    Run {
        /// Only run these companies (repeatable). Defaults to all configured.
        #[arg(short, long)]
        company: Vec<String>,

        /// Companies processed in parallel (defaults to `[defaults].concurrency`).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print one JSON report per company instead of the summary table.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or edit the lead ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Ledger subcommands.
#[derive(Subcommand)]
pub(crate) enum LedgerAction {
    /// Print every company and its notified areas.
    Show,
    /// Store backend and row counts, including unparseable rows.
    Status,
    /// Dry run: which of these areas would be new for the company.
    Check {
        company: String,
        /// Comma- or semicolon-separated areas.
        areas: String,
    },
    /// Record areas as notified without sending anything.
    Record {
        company: String,
        /// Comma- or semicolon-separated areas.
        areas: String,
    },
    /// Per-area notification history for a company.
    History { company: String },
    /// Write every record to a CSV table.
    Export { file: PathBuf },
    /// Merge the records of a CSV table into the ledger.
    Import { file: PathBuf },
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "leadscout=info",
        1 => "leadscout=debug",
        _ => "leadscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
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
            company,
            concurrency,
            json,
        } => cmd_run(&company, concurrency, json).await,
        Command::Ledger { action } => {
            let config = load_config()?;
            let ledger = open_ledger(&config.ledger).await?;
            match action {
                LedgerAction::Show => cmd_ledger_show(&ledger).await,
                LedgerAction::Status => cmd_ledger_status(&ledger).await,
                LedgerAction::Check { company, areas } => {
                    cmd_ledger_check(&ledger, &company, &areas).await
                }
                LedgerAction::Record { company, areas } => {
                    cmd_ledger_record(&ledger, &company, &areas).await
                }
                LedgerAction::History { company } => cmd_ledger_history(&ledger, &company).await,
                LedgerAction::Export { file } => cmd_ledger_export(&ledger, &file).await,
                LedgerAction::Import { file } => cmd_ledger_import(&ledger, &file).await,
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Targets named on the command line, or every configured company.
///
/// Names not in the config are run with default settings.
fn select_targets(config: &AppConfig, names: &[String]) -> Vec<CompanyTarget> {
    if names.is_empty() {
        return config.companies.clone();
    }
    names
        .iter()
        .map(|name| {
            config
                .companies
                .iter()
                .find(|c| &c.name == name)
                .cloned()
                .unwrap_or_else(|| CompanyTarget::named(name))
        })
        .collect()
}

fn describe(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::NoNews => "no news found".into(),
        RunOutcome::SourceNotFound(what) => format!("no {what} found"),
        RunOutcome::NotALead => "not a lead".into(),
        RunOutcome::NoCandidates => "no lead areas extracted".into(),
        RunOutcome::AlreadyNotified => "all areas already notified".into(),
        RunOutcome::Processed => "processed".into(),
    }
}

async fn cmd_run(names: &[String], concurrency: Option<usize>, json: bool) -> Result<()> {
    let config = load_config()?;
    let targets = select_targets(&config, names);
    if targets.is_empty() {
        return Err(eyre!(
            "no companies to run. Add [[companies]] to the config or pass --company."
        ));
    }

    let collaborators = Arc::new(build_collaborators(&config).await?);
    let concurrency = concurrency.unwrap_or(config.defaults.concurrency);
    info!(companies = targets.len(), concurrency, "starting run");

    let progress: Arc<dyn ProgressReporter> = if json {
        Arc::new(leadscout_core::SilentProgress)
    } else {
        Arc::new(CliProgress::new())
    };
    let runs = run_all(
        &targets,
        &config.defaults,
        collaborators,
        concurrency,
        progress,
    )
    .await;

    if json {
        for run in &runs {
            let line = match &run.result {
                Ok(report) => serde_json::to_string(report)?,
                Err(e) => serde_json::json!({ "company": run.company, "error": e.to_string() })
                    .to_string(),
            };
            println!("{line}");
        }
    } else {
        print_summary(&runs);
    }

    let failed = runs.iter().filter(|r| r.failed()).count();
    if failed > 0 {
        return Err(eyre!("{failed} of {} companies failed", runs.len()));
    }
    Ok(())
}

fn print_summary(runs: &[CompanyRun]) {
    println!();
    for run in runs {
        match &run.result {
            Ok(report) => {
                println!("  {}: {}", run.company, describe(&report.outcome));
                for area in &report.areas {
                    println!("    {:<20} {:?}", area.area, area.status);
                }
            }
            Err(e) => println!("  {}: failed: {e}", run.company),
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// One spinner per company under a shared multi-progress display.
struct CliProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar(&self, company: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.entry(company.to_string())
            .or_insert_with(|| {
                let spinner = self.multi.add(ProgressBar::new_spinner());
                if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                {
                    spinner.set_style(
                        style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
                    );
                }
                spinner.set_prefix(company.to_string());
                spinner.enable_steady_tick(Duration::from_millis(80));
                spinner
            })
            .clone()
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, company: &str, name: &str) {
        self.bar(company).set_message(name.to_string());
    }

    fn done(&self, run: &CompanyRun) {
        let bar = self.bar(&run.company);
        match &run.result {
            Ok(report) => bar.finish_with_message(describe(&report.outcome)),
            Err(_) => bar.finish_with_message("failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// ledger
// ---------------------------------------------------------------------------

async fn cmd_ledger_show(ledger: &Ledger) -> Result<()> {
    let records = ledger.records().await?;
    if records.is_empty() {
        println!("No companies recorded yet.");
        return Ok(());
    }
    for record in records {
        println!(
            "  {:<30} {}  {}",
            record.company_name,
            record.timestamp(),
            record.notified_areas
        );
    }
    Ok(())
}

async fn cmd_ledger_status(ledger: &Ledger) -> Result<()> {
    let health = ledger.inspect().await?;
    println!("  Store:     {}", ledger.store_name());
    println!("  Companies: {}", health.records);
    println!("  Malformed: {}", health.malformed);
    Ok(())
}

async fn cmd_ledger_check(ledger: &Ledger, company: &str, areas: &str) -> Result<()> {
    let reconciliation = ledger.reconcile(company, areas).await;
    println!("  Outcome:  {}", reconciliation.outcome.as_str());
    println!("  Existing: {}", reconciliation.existing);
    println!("  Novel:    {}", reconciliation.novel);
    Ok(())
}

async fn cmd_ledger_record(ledger: &Ledger, company: &str, areas: &str) -> Result<()> {
    let areas = parse_candidates(areas);
    if areas.is_empty() {
        return Err(eyre!("no areas given"));
    }
    let (added, record) = ledger.record(company, areas).await?;
    if added.is_empty() {
        println!("Nothing new for {company}: {}", record.notified_areas);
    } else {
        println!("Recorded {added} for {company}: {}", record.notified_areas);
    }
    Ok(())
}

async fn cmd_ledger_history(ledger: &Ledger, company: &str) -> Result<()> {
    let history = ledger.history(company).await?;
    if history.is_empty() {
        println!("No notifications recorded for {company}.");
    }
    for (area, at) in history {
        println!("  {}  {area}", at.format(TIMESTAMP_FORMAT));
    }
    Ok(())
}

async fn cmd_ledger_export(ledger: &Ledger, file: &Path) -> Result<()> {
    let records = ledger.records().await?;
    let mut table = LeadTable::new();
    for record in &records {
        table.merge(record);
    }
    std::fs::write(file, table.encode())?;
    println!("Exported {} companies to {}", records.len(), file.display());
    Ok(())
}

async fn cmd_ledger_import(ledger: &Ledger, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file)?;
    let table = LeadTable::decode(&bytes)?;
    let records: Vec<_> = table.records().cloned().collect();
    let grown = ledger.import(&records).await?;
    println!(
        "Imported {} companies from {} ({grown} changed, {} malformed rows skipped)",
        records.len(),
        file.display(),
        table.malformed_count()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
