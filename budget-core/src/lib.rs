//! budget-core: deduplication and merge engine for syncing bank CSV exports
//! into expense and income ledgers

pub mod dedup;
pub mod error;
pub mod filter;
pub mod merge;
pub mod money;
pub mod record;
pub mod settings;
pub mod store;
pub mod sync;

pub use dedup::{DuplicateDetector, DuplicateMatch};
pub use error::{SyncError, SyncResult};
pub use filter::NoiseFilter;
pub use merge::{LedgerMerger, format_ledger_date, parse_ledger_date};
pub use money::{AMOUNT_TOLERANCE, CURRENCY_PATTERN, format_currency, parse_money};
pub use record::{BatchEntry, Kind, LedgerRow, TransactionRecord, normalize_name};
pub use settings::{A1Range, DataRange, SyncSettings, column_index, column_letters};
pub use store::{BatchSource, CellFormat, LedgerStore, MemoryLedgerStore, ValueInput};
pub use sync::{LedgerOutcome, SyncOrchestrator, SyncReport};
