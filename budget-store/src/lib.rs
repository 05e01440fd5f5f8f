//! budget-store: ledger store backends (local CSV files, Google Sheets)

pub mod local;
#[cfg(feature = "gsheets")]
pub mod sheets;

pub use local::{LEDGER_HEADER, LocalLedgerStore};
#[cfg(feature = "gsheets")]
pub use sheets::SheetsLedgerStore;
