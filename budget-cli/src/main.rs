use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use budget_core::SyncError;
use budget_ingest::CsvBatchSource;
use budget_store::LocalLedgerStore;

mod app;
mod config;
mod logging;

use config::{Config, DEFAULT_CONFIG_FILE, StoreBackend};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUDGET_SYNC_BUILD_SHA"),
    ")"
);

#[derive(Parser, Debug)]
#[command(
    name = "budget-sync",
    version = VERSION,
    about = "Import bank CSV exports into expense and income ledgers without duplicates"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file and create empty local ledgers
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Import the uploads folder into the ledgers
    Sync {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Compute the merge but leave the ledgers untouched
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Validate the config and report what a sync would read
    Check {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Init { config, force } => report(init(&config, force)),
        Command::Check { config } => report(check(&config)),
        Command::Sync {
            config,
            dry_run,
            json,
        } => sync(&config, dry_run, json),
    }
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_resolved(path: &Path) -> Result<Config> {
    let cfg = config::load_config(path)?;
    Ok(cfg.resolved(&config::config_base(path)))
}

fn init(path: &Path, force: bool) -> Result<()> {
    if config::init_config(path, force)? {
        println!("Wrote {}", path.display());
    } else {
        println!("{} already exists (use --force to overwrite)", path.display());
    }

    let cfg = load_resolved(path)?;
    if cfg.store.backend == StoreBackend::Local {
        for ledger in app::create_local_ledgers(&cfg)? {
            println!("Created ledger {ledger}");
        }
    }
    std::fs::create_dir_all(&cfg.paths.uploads_path)
        .with_context(|| format!("create {}", cfg.paths.uploads_path.display()))?;
    println!("Drop bank CSV exports into {}", cfg.paths.uploads_path.display());
    Ok(())
}

fn check(path: &Path) -> Result<()> {
    let cfg = load_resolved(path)?;
    cfg.validate()?;
    println!("Config OK: {}", path.display());

    let source = CsvBatchSource::new(&cfg.paths.uploads_path, &cfg.csv.columns)?;
    let files = source.discover()?;
    println!("{} CSV file(s) in {}", files.len(), source.dir().display());
    for file in &files {
        let rows = source.load_file(file)?;
        println!("  {}: {} row(s)", file.display(), rows.len());
    }

    match cfg.store.backend {
        StoreBackend::Local => {
            let store = LocalLedgerStore::new(&cfg.store.local_dir);
            for ledger in [&cfg.store.expense_sheet, &cfg.store.income_sheet] {
                let ledger_path = store.ledger_path(ledger)?;
                let state = if ledger_path.is_file() { "ok" } else { "missing" };
                println!("Ledger {ledger}: {} ({state})", ledger_path.display());
            }
        }
        StoreBackend::GoogleSheets => {
            println!("Spreadsheet: {}", cfg.store.spreadsheet_id);
        }
    }
    Ok(())
}

fn sync(path: &Path, dry_run: bool, json: bool) -> ExitCode {
    let cfg = match load_resolved(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(app::exit_code(&SyncError::Config(format!("{e:#}"))));
        }
    };

    match logging::init_logging(&cfg.paths.log_folder, &cfg.logging) {
        Ok(log_file) => info!("Logging to {}", log_file.display()),
        Err(e) => eprintln!("Warning: file logging disabled: {e:#}"),
    }

    info!("{}", "=".repeat(60));
    info!("Budget sync {VERSION} starting");
    info!("Config: {}", path.display());
    if dry_run {
        info!("Dry run: ledgers will not be modified");
    }
    info!("{}", "=".repeat(60));

    match app::run_sync(&cfg, dry_run) {
        Ok(report) => {
            info!("Sync completed: {} new row(s)", report.added());
            if json {
                match app::report_json(&report) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        error!("Sync failed ({}): {e}", e.kind());
                        eprintln!("Error: {e}");
                        return ExitCode::from(app::exit_code(&e));
                    }
                }
            } else {
                for line in app::summary_lines(&report) {
                    println!("{line}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sync failed ({}): {e}", e.kind());
            eprintln!("Error: {e}");
            ExitCode::from(app::exit_code(&e))
        }
    }
}
