//! Error kinds a sync run can end with

/// Fatal outcome of a sync run. Data-quality problems never surface here;
/// they are logged and recovered where they occur.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("store error for ledger '{ledger}': {message}")]
    Store { ledger: String, message: String },

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SyncError {
    pub fn store(ledger: impl Into<String>, err: anyhow::Error) -> Self {
        SyncError::Store {
            ledger: ledger.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn input(err: anyhow::Error) -> Self {
        SyncError::Input(format!("{err:#}"))
    }

    /// Short stable name of the error kind, for logs and exit-code mapping
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "config",
            SyncError::Input(_) => "input",
            SyncError::Store { .. } => "store",
            SyncError::Unexpected(_) => "unexpected",
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_names_ledger() {
        let err = SyncError::store(
            "Expenses",
            anyhow::anyhow!("not found").context("opening worksheet"),
        );
        assert_eq!(err.kind(), "store");
        let msg = err.to_string();
        assert!(msg.contains("'Expenses'"));
        assert!(msg.contains("opening worksheet: not found"));
    }
}
