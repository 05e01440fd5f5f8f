//! budget-ingest: loads bank CSV exports into an import batch.

pub mod csv_batch;
pub mod dates;
pub mod types;

pub use csv_batch::CsvBatchSource;
pub use dates::parse_mixed_date;
pub use types::ColumnMapping;
