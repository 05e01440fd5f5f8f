use budget_core::{LedgerStore, SyncError, SyncOrchestrator, SyncReport, SyncResult};
use budget_ingest::CsvBatchSource;
use budget_store::LocalLedgerStore;
use tracing::info;

use crate::config::{Config, StoreBackend};

/// Process exit code for a failed run.
pub fn exit_code(err: &SyncError) -> u8 {
    match err {
        SyncError::Config(_) => 2,
        SyncError::Input(_) => 3,
        SyncError::Store { .. } => 4,
        SyncError::Unexpected(_) => 1,
    }
}

/// One full sync with an already resolved config.
pub fn run_sync(cfg: &Config, dry_run: bool) -> SyncResult<SyncReport> {
    cfg.validate()
        .map_err(|e| SyncError::Config(format!("{e:#}")))?;

    let mut source = CsvBatchSource::new(&cfg.paths.uploads_path, &cfg.csv.columns)
        .map_err(|e| SyncError::Config(format!("{e:#}")))?;
    let mut store = open_store(cfg)?;

    let orchestrator = SyncOrchestrator::new(cfg.sync_settings()).dry_run(dry_run);
    orchestrator.run(&mut source, store.as_mut())
}

pub fn open_store(cfg: &Config) -> SyncResult<Box<dyn LedgerStore>> {
    match cfg.store.backend {
        StoreBackend::Local => {
            info!("Using local ledgers in {}", cfg.store.local_dir.display());
            Ok(Box::new(LocalLedgerStore::new(&cfg.store.local_dir)))
        }
        StoreBackend::GoogleSheets => open_sheets(cfg),
    }
}

#[cfg(feature = "gsheets")]
fn open_sheets(cfg: &Config) -> SyncResult<Box<dyn LedgerStore>> {
    let store = budget_store::SheetsLedgerStore::connect(
        &cfg.paths.service_account_file,
        &cfg.store.spreadsheet_id,
    )
    .map_err(|e| SyncError::store(&cfg.store.spreadsheet_id, e))?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "gsheets"))]
fn open_sheets(_cfg: &Config) -> SyncResult<Box<dyn LedgerStore>> {
    Err(SyncError::Config(
        "google-sheets backend needs a build with `--features gsheets`".to_string(),
    ))
}

/// Create missing local ledgers. Returns the names that were created.
pub fn create_local_ledgers(cfg: &Config) -> anyhow::Result<Vec<String>> {
    let store = LocalLedgerStore::new(&cfg.store.local_dir);
    let mut created = Vec::new();
    for ledger in [&cfg.store.expense_sheet, &cfg.store.income_sheet] {
        if store.create_ledger(ledger)? {
            created.push(ledger.clone());
        }
    }
    Ok(created)
}

/// Run report as pretty JSON for `sync --json`.
pub fn report_json(report: &SyncReport) -> SyncResult<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| SyncError::Unexpected(format!("serializing run report: {e}")))
}

/// Human-readable run summary printed after a sync.
pub fn summary_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Loaded {} transaction(s), {} filtered out",
        report.loaded, report.filtered_out
    )];
    for outcome in [&report.expense, &report.income] {
        lines.push(format!(
            "{}: {} new, {} duplicate(s), {} row(s) total",
            outcome.ledger, outcome.accepted, outcome.duplicates, outcome.total_rows
        ));
    }
    if report.dry_run {
        lines.push("Dry run: no ledger was modified".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn local_config(root: &std::path::Path) -> Config {
        let mut cfg = Config::default().resolved(root);
        cfg.processing.filter_strings = vec!["transfer".to_string()];
        cfg
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&SyncError::Config("x".into())), 2);
        assert_eq!(exit_code(&SyncError::Input("x".into())), 3);
        assert_eq!(
            exit_code(&SyncError::store("Expenses", anyhow::anyhow!("x"))),
            4
        );
        assert_eq!(exit_code(&SyncError::Unexpected("x".into())), 1);
    }

    #[test]
    fn test_run_sync_against_local_ledgers() {
        let dir = TempDir::new().unwrap();
        let cfg = local_config(dir.path());
        fs::create_dir_all(&cfg.paths.uploads_path).unwrap();
        fs::write(
            cfg.paths.uploads_path.join("bank.csv"),
            "01/05/2024,Coffee Shop,4.50,\n\
             01/06/2024,Payroll,,2500.00\n\
             01/07/2024,Transfer to savings,100.00,\n",
        )
        .unwrap();
        assert_eq!(create_local_ledgers(&cfg).unwrap().len(), 2);

        let dry = run_sync(&cfg, true).unwrap();
        assert_eq!(dry.added(), 2);
        assert!(!dry.expense.written);

        let report = run_sync(&cfg, false).unwrap();
        assert_eq!(report.loaded, 3);
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.expense.accepted, 1);
        assert_eq!(report.income.accepted, 1);

        let again = run_sync(&cfg, false).unwrap();
        assert_eq!(again.added(), 0);
        assert_eq!(again.expense.duplicates, 1);
        assert!(summary_lines(&again)[1].starts_with("Expenses: 0 new"));

        let json: serde_json::Value = serde_json::from_str(&report_json(&report).unwrap()).unwrap();
        assert_eq!(json["expense"]["accepted"], 1);
        assert_eq!(json["dry_run"], false);
    }

    #[test]
    fn test_missing_uploads_is_input_error() {
        let dir = TempDir::new().unwrap();
        let cfg = local_config(dir.path());
        create_local_ledgers(&cfg).unwrap();
        let err = run_sync(&cfg, false).unwrap_err();
        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut cfg = local_config(dir.path());
        cfg.processing.date_format = "%Y-%m-%".to_string();
        assert_eq!(exit_code(&run_sync(&cfg, false).unwrap_err()), 2);
    }
}
