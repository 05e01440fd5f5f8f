use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingSection;

const LOG_SUFFIX: &str = "_budget_sync.log";

/// Set up the global subscriber: one log file per run, plus stderr when
/// `console_logging` is on. `RUST_LOG` overrides the configured level.
pub fn init_logging(folder: &Path, cfg: &LoggingSection) -> Result<PathBuf> {
    fs::create_dir_all(folder).with_context(|| format!("create {}", folder.display()))?;

    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = folder.join(format!("{stamp}{LOG_SUFFIX}"));
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&cfg.log_level)));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_timer(ChronoLocal::new(cfg.log_date_format.clone()));

    let console_layer = cfg.console_logging.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(ChronoLocal::new(cfg.log_date_format.clone()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;

    // Current run plus `backup_count` older ones.
    let removed = prune_old_logs(folder, cfg.backup_count + 1)?;
    if removed > 0 {
        tracing::debug!("removed {removed} old log file(s)");
    }
    Ok(path)
}

/// Map the level names people put in config files onto tracing's.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        "off" => "off",
        _ => "info",
    }
}

/// Delete the oldest run logs so that at most `keep` remain.
/// Run logs sort by name because the name starts with the timestamp.
pub fn prune_old_logs(folder: &Path, keep: usize) -> Result<usize> {
    let mut logs: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("read {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(LOG_SUFFIX))
        })
        .collect();
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    for old in &logs[..excess] {
        fs::remove_file(old).with_context(|| format!("remove {}", old.display()))?;
    }
    Ok(excess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("INFO"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive("verbose"), "info");
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for stamp in [
            "2024-01-01_09-00-00",
            "2024-01-02_09-00-00",
            "2024-01-03_09-00-00",
            "2024-01-04_09-00-00",
        ] {
            fs::write(dir.path().join(format!("{stamp}{LOG_SUFFIX}")), "").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        assert_eq!(prune_old_logs(dir.path(), 2).unwrap(), 2);
        assert!(!dir.path().join(format!("2024-01-02_09-00-00{LOG_SUFFIX}")).exists());
        assert!(dir.path().join(format!("2024-01-03_09-00-00{LOG_SUFFIX}")).exists());
        assert!(dir.path().join("notes.txt").exists());

        assert_eq!(prune_old_logs(dir.path(), 5).unwrap(), 0);
    }
}
