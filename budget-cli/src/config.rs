use anyhow::{Context, Result, bail};
use budget_core::settings::validate_date_format;
use budget_core::{DataRange, SyncSettings};
use budget_ingest::ColumnMapping;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "budget-sync.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: PathsSection,
    pub store: StoreSection,
    pub csv: CsvSection,
    pub processing: ProcessingSection,
    pub sheets: SheetsSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsSection {
    /// Folder holding the CSV exports to import
    pub uploads_path: PathBuf,
    /// Google service account key (google-sheets backend only)
    pub service_account_file: PathBuf,
    pub log_folder: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// One CSV file per ledger under `local_dir`
    Local,
    /// Worksheets of a Google spreadsheet
    GoogleSheets,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub local_dir: PathBuf,
    pub spreadsheet_id: String,
    pub expense_sheet: String,
    pub income_sheet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CsvSection {
    /// Column names, in file order, of the headerless exports
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessingSection {
    pub date_format: String,
    /// Names containing any of these are dropped...
    pub filter_strings: Vec<String>,
    /// ...unless they also contain one of these
    pub keep_account_numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetsSection {
    pub data_start_row: u32,
    pub data_start_column: String,
    pub data_end_column: String,
    pub amount_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    pub log_level: String,
    pub log_date_format: String,
    pub console_logging: bool,
    /// Older run logs kept next to the current one
    pub backup_count: usize,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            uploads_path: PathBuf::from("uploads"),
            service_account_file: PathBuf::from("service_account.json"),
            log_folder: PathBuf::from("logs"),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            local_dir: PathBuf::from("ledgers"),
            spreadsheet_id: String::new(),
            expense_sheet: "Expenses".to_string(),
            income_sheet: "Income".to_string(),
        }
    }
}

impl Default for CsvSection {
    fn default() -> Self {
        Self {
            columns: ["date", "name", "cost", "payment"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl Default for ProcessingSection {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            filter_strings: vec!["TRANSFER".to_string()],
            keep_account_numbers: Vec::new(),
        }
    }
}

impl Default for SheetsSection {
    fn default() -> Self {
        let range = DataRange::default();
        Self {
            data_start_row: range.start_row,
            data_start_column: range.start_column,
            data_end_column: range.end_column,
            amount_column: range.amount_column,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            console_logging: true,
            backup_count: 5,
        }
    }
}

impl Config {
    /// Values the sync engine runs with
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            date_format: self.processing.date_format.clone(),
            exclude_patterns: self.processing.filter_strings.clone(),
            keep_patterns: self.processing.keep_account_numbers.clone(),
            expense_ledger: self.store.expense_sheet.clone(),
            income_ledger: self.store.income_sheet.clone(),
            range: DataRange {
                start_row: self.sheets.data_start_row,
                start_column: self.sheets.data_start_column.clone(),
                end_column: self.sheets.data_end_column.clone(),
                amount_column: self.sheets.amount_column.clone(),
            },
        }
    }

    /// Everything that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        self.sync_settings().validate()?;
        ColumnMapping::from_names(&self.csv.columns)?;
        validate_date_format(&self.logging.log_date_format).context("[logging] log_date_format")?;

        if self.store.backend == StoreBackend::GoogleSheets {
            if self.store.spreadsheet_id.trim().is_empty() {
                bail!("[store] spreadsheet_id is required for the google-sheets backend");
            }
            if !cfg!(feature = "gsheets") {
                bail!("google-sheets backend needs a build with `--features gsheets`");
            }
        }
        Ok(())
    }

    /// Copy with relative paths anchored at `base` (the config file's folder).
    pub fn resolved(&self, base: &Path) -> Self {
        let mut cfg = self.clone();
        cfg.paths.uploads_path = anchor(base, &cfg.paths.uploads_path);
        cfg.paths.service_account_file = anchor(base, &cfg.paths.service_account_file);
        cfg.paths.log_folder = anchor(base, &cfg.paths.log_folder);
        cfg.store.local_dir = anchor(base, &cfg.store.local_dir);
        cfg
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Folder relative paths in the config file are resolved against
pub fn config_base(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!(
            "Configuration file '{}' not found. Run: budget-sync init",
            path.display()
        );
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Write a default config unless one exists. Returns false when it did.
pub fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    save_config(path, &Config::default())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[processing]
date_format = "%m/%d/%Y"
filter_strings = ["xfer"]

[sheets]
data_start_row = 3
"#,
        )
        .unwrap();
        let settings = cfg.sync_settings();
        assert_eq!(settings.date_format, "%m/%d/%Y");
        assert_eq!(settings.exclude_patterns, vec!["xfer"]);
        assert!(settings.keep_patterns.is_empty());
        assert_eq!(settings.range.a1(), "A3:E");
        assert_eq!(cfg.store.backend, StoreBackend::Local);
    }

    #[test]
    fn test_backend_names() {
        let cfg: Config = toml::from_str(
            "[store]\nbackend = \"google-sheets\"\nspreadsheet_id = \"abc\"\n",
        )
        .unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::GoogleSheets);
        assert_eq!(cfg.validate().is_ok(), cfg!(feature = "gsheets"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut bad_column = Config::default();
        bad_column.sheets.amount_column = "Z".to_string();
        assert!(bad_column.validate().is_err());

        let mut bad_csv = Config::default();
        bad_csv.csv.columns = vec!["date".to_string(), "name".to_string()];
        assert!(bad_csv.validate().is_err());

        let mut no_sheet = Config::default();
        no_sheet.store.backend = StoreBackend::GoogleSheets;
        assert!(no_sheet.validate().is_err());
    }

    #[test]
    fn test_resolved_paths() {
        let cfg = Config::default().resolved(Path::new("/srv/budget"));
        assert_eq!(cfg.paths.uploads_path, PathBuf::from("/srv/budget/uploads"));
        assert_eq!(cfg.store.local_dir, PathBuf::from("/srv/budget/ledgers"));
        assert_eq!(config_base(Path::new("budget-sync.toml")), PathBuf::from("."));
    }

    #[test]
    fn test_init_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join(DEFAULT_CONFIG_FILE);
        assert!(init_config(&path, false).unwrap());
        assert!(!init_config(&path, false).unwrap());
        assert_eq!(load_config(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_missing_config_hints_init() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("budget-sync init"));
    }
}
