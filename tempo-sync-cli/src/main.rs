//! tempo-sync
//!
//! Usage:
//!   tempo-sync --check                                  # Check connectivity first
//!   tempo-sync 202605                                   # Dry-run (default)
//!   tempo-sync 202605 --scan                            # Dry-run, list rows that would be deleted
//!   tempo-sync 202605 --execute                         # Apply changes
//!   tempo-sync 202605 --cutover 2026-01-29 --execute    # Only sync from this date onwards

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};

use tempo_sync::check::{all_ok, check_connectivity};
use tempo_sync::clients::{JiraClient, TempoClient};
use tempo_sync::logging::init_logging;
use tempo_sync::reconcile::{apply, prepare, SyncOptions, SyncOutcome};
use tempo_sync::{report, AppConfig, MappingStore};
use unit4::patterns::DATE_FORMAT;
use unit4::{ConsoleOperator, Operator, Period, Unit4Driver};

#[derive(Parser, Debug)]
#[command(name = "tempo-sync", version)]
#[command(about = "Sync Tempo worklogs into the Unit4 weekly timesheet")]
#[command(
    long_about = "Deletes every row this tool wrote for the week and recreates one row per Tempo worklog. Runs as a dry-run unless --execute is given."
)]
struct Cli {
    /// Week to sync as YYYYWW (default: current week)
    period: Option<String>,

    /// Actually change Unit4 (default: dry-run)
    #[arg(long)]
    execute: bool,

    /// Only sync worklogs from this date onwards (YYYY-MM-DD)
    #[arg(long)]
    cutover: Option<String>,

    /// Check connectivity to all services and exit
    #[arg(long)]
    check: bool,

    /// In dry-run, open Unit4 and list the entries that would be deleted
    #[arg(long)]
    scan: bool,

    /// Configuration file
    #[arg(long, env = "TEMPO_SYNC_CONFIG", default_value = "config.json")]
    config: PathBuf,
}

fn parse_cutover(raw: &str) -> Result<NaiveDate> {
    if !DATE_FORMAT.is_match(raw) {
        anyhow::bail!("Invalid cutover format '{raw}'. Expected YYYY-MM-DD");
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid cutover date '{raw}'"))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(&cli.config)?;

    if cli.check {
        let items = check_connectivity(&config).await;
        report::check_results(&items);
        return Ok(if all_ok(&items) {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let period = match cli.period.as_deref() {
        Some(raw) => raw.parse::<Period>()?,
        None => Period::current(),
    };
    let cutover = cli.cutover.as_deref().map(parse_cutover).transpose()?;
    config.validate()?;

    let options = SyncOptions {
        execute: cli.execute,
        cutover,
        scan: cli.scan,
        ..SyncOptions::new(period)
    };
    report::header(&options);

    let mut mapping = MappingStore::load(&config.mapping_file)?;
    println!("[*] Loaded mapping with {} accounts", mapping.len());

    let jira = JiraClient::new(&config.jira)?;
    let tempo = TempoClient::new(&config.tempo, jira.clone())?;
    let operator: Arc<dyn Operator> = Arc::new(ConsoleOperator);

    let mut run = match prepare(&options, &tempo, &jira, &mut mapping, operator.as_ref()).await {
        Ok(run) => run,
        Err(e) => {
            report::error(&format!("API Error: {e:#}"));
            println!("    Run 'tempo-sync --check' to diagnose the issue.");
            return Ok(ExitCode::from(1));
        }
    };

    if run.outcome == SyncOutcome::NothingToSync {
        println!();
        println!("[*] No worklogs to sync. Done.");
        return Ok(ExitCode::SUCCESS);
    }
    report::plan(&run);

    if run.needs_browser() {
        let driver = Unit4Driver::launch(config.unit4.clone(), operator.clone())
            .await
            .context("Failed to start the browser")?
            .with_dry_run(run.dry_run);
        let result = apply(&mut run, &driver, operator.as_ref(), &options).await;
        if result.is_ok() {
            operator.pause("Press ENTER to close the browser").await;
        }
        driver.close().await;
        result?;
    }

    if run.dry_run {
        report::dry_run(&run);
    }
    report::summary(&run);
    debug!(?run.outcome, "Sync finished");
    if matches!(run.outcome, SyncOutcome::DeletionIncomplete { .. }) {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("{e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}
