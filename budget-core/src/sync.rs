//! Sync orchestrator: batch → noise filter → per-ledger dedup → merge → write.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dedup::{DuplicateDetector, DuplicateMatch};
use crate::error::{SyncError, SyncResult};
use crate::filter::NoiseFilter;
use crate::merge::{LedgerMerger, format_ledger_date};
use crate::record::{BatchEntry, Kind, LedgerRow, TransactionRecord};
use crate::settings::SyncSettings;
use crate::store::{BatchSource, CellFormat, LedgerStore, ValueInput};

/// What happened to one ledger during a run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub ledger: String,
    pub existing_rows: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub duplicates: usize,
    /// Rows in the ledger after the merge (equals `existing_rows` when nothing was written)
    pub total_rows: usize,
    pub written: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncReport {
    pub loaded: usize,
    pub filtered_out: usize,
    pub expense: LedgerOutcome,
    pub income: LedgerOutcome,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn added(&self) -> usize {
        self.expense.accepted + self.income.accepted
    }
}

/// Drives one sync run against a batch source and a ledger store
pub struct SyncOrchestrator {
    settings: SyncSettings,
    filter: NoiseFilter,
    detector: DuplicateDetector,
    merger: LedgerMerger,
    dry_run: bool,
}

impl SyncOrchestrator {
    pub fn new(settings: SyncSettings) -> Self {
        let filter = NoiseFilter::new(&settings.exclude_patterns, &settings.keep_patterns);
        let merger = LedgerMerger::new(settings.date_format.clone());
        let detector = DuplicateDetector::with_date_format(settings.date_format.clone());
        Self {
            settings,
            filter,
            detector,
            merger,
            dry_run: false,
        }
    }

    /// Compute everything but skip store writes.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run the whole pipeline. Expense is processed before Income; a failure
    /// on Income leaves an already written Expense ledger in place.
    pub fn run(
        &self,
        source: &mut dyn BatchSource,
        store: &mut dyn LedgerStore,
    ) -> SyncResult<SyncReport> {
        self.settings.validate()?;

        info!("Loading batch...");
        let loaded = source.load_records().map_err(SyncError::input)?;
        let loaded_count = loaded.len();
        info!("Combined data: {loaded_count} total rows");

        info!("Filtering transactions...");
        let batch = self.filter.apply(loaded);
        let filtered_out = loaded_count - batch.len();
        info!("Filtered out {filtered_out} transactions");

        let expenses = split_view(&batch, Kind::Expense);
        let payments = split_view(&batch, Kind::Income);
        info!(
            "Found {} payment(s) and {} expense(s)",
            payments.len(),
            expenses.len()
        );

        let expense = self.sync_ledger(Kind::Expense, &expenses, &batch, store)?;
        let income = self.sync_ledger(Kind::Income, &payments, &batch, store)?;

        Ok(SyncReport {
            loaded: loaded_count,
            filtered_out,
            expense,
            income,
            dry_run: self.dry_run,
        })
    }

    fn sync_ledger(
        &self,
        kind: Kind,
        candidates: &[TransactionRecord],
        batch: &[BatchEntry],
        store: &mut dyn LedgerStore,
    ) -> SyncResult<LedgerOutcome> {
        let ledger = self.settings.ledger_for(kind).to_string();
        let data_range = self.settings.range.a1();
        info!("Processing {} ledger '{ledger}'", kind.label());

        debug!("Fetching existing data from range: {data_range}");
        let existing: Vec<LedgerRow> = store
            .get_range(&ledger, &data_range)
            .map_err(|e| SyncError::store(&ledger, e))?
            .iter()
            .map(|cells| LedgerRow::from_cells(cells))
            .collect();
        info!("Existing data: {} {} rows", existing.len(), kind.label());

        let accepted = self.accept_new(kind, candidates, &existing, batch);

        let mut outcome = LedgerOutcome {
            ledger: ledger.clone(),
            existing_rows: existing.len(),
            candidates: candidates.len(),
            accepted: accepted.len(),
            duplicates: candidates.len() - accepted.len(),
            total_rows: existing.len(),
            written: false,
        };

        if accepted.is_empty() {
            info!("No new {} rows to add", kind.label());
            return Ok(outcome);
        }

        info!(
            "Merging {} new {} row(s) with existing data...",
            accepted.len(),
            kind.label()
        );
        let merged = self
            .merger
            .merge(&existing, &accepted)
            .map_err(|e| SyncError::Config(format!("{e:#}")))?;
        outcome.total_rows = merged.len();

        if self.dry_run {
            info!(
                "Dry run: would write {} rows to '{ledger}'",
                merged.len()
            );
            return Ok(outcome);
        }

        self.write_ledger(&ledger, &merged, store)
            .map_err(|e| SyncError::store(&ledger, e))?;
        outcome.written = true;
        info!("[OK] Added {} new {} row(s)", accepted.len(), kind.label());
        Ok(outcome)
    }

    fn accept_new(
        &self,
        kind: Kind,
        candidates: &[TransactionRecord],
        existing: &[LedgerRow],
        batch: &[BatchEntry],
    ) -> Vec<TransactionRecord> {
        let mut accepted = Vec::new();
        for candidate in candidates {
            let shown = format!(
                "{} - {} - ${:.2}",
                format_ledger_date(candidate.date, &self.settings.date_format)
                    .unwrap_or_else(|_| candidate.date.to_string()),
                candidate.name,
                candidate.amount
            );
            match self.detector.find_match(candidate, existing, batch) {
                None => {
                    info!("Queued {}: {shown}", kind.label());
                    accepted.push(candidate.clone());
                }
                Some(DuplicateMatch::Ledger { row }) => {
                    info!(
                        "Skipping duplicate {} (already in ledger row {}): {shown}",
                        kind.label(),
                        row + 1
                    );
                }
                Some(DuplicateMatch::Batch { entry }) => {
                    info!(
                        "Skipping duplicate {} (repeated in import batch, entry {}): {shown}",
                        kind.label(),
                        entry + 1
                    );
                }
            }
        }
        accepted
    }

    /// Full replace of the data range, then currency format over every
    /// written amount cell.
    fn write_ledger(
        &self,
        ledger: &str,
        rows: &[LedgerRow],
        store: &mut dyn LedgerStore,
    ) -> anyhow::Result<()> {
        let data_range = self.settings.range.a1();
        info!("Updating '{ledger}' with {} total rows...", rows.len());

        store.clear_range(ledger, &data_range)?;
        if rows.is_empty() {
            return Ok(());
        }

        let cells: Vec<Vec<String>> = rows.iter().map(LedgerRow::to_cells).collect();
        store.write_range(ledger, &data_range, &cells, ValueInput::UserEntered)?;

        let amount_range = self.settings.range.amount_a1(rows.len());
        store.format_column(ledger, &amount_range, CellFormat::Currency)?;
        debug!("Applied currency formatting to range: {amount_range}");
        Ok(())
    }
}

fn split_view(batch: &[BatchEntry], kind: Kind) -> Vec<TransactionRecord> {
    batch.iter().filter_map(|e| e.record(kind)).collect()
}
