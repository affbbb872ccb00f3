//! Per-run logging context.
//!
//! Every command logs to the console and, when it belongs to a step or a
//! maintenance operation, to `<log_root>/<domain>_logs/<name>.log`. The
//! context is built once in `main` and keeps the file writer alive until
//! the run ends.
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::MigrationError;

const DEFAULT_FILTER: &str = "voxel_migrate=info,voxel_migrate_pipeline=info,voxel_migrate_repository=info";

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects JSON lines; anything else is pretty.
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT").map(|value| value.to_lowercase()) {
            Ok(value) if value == "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Names the log file of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub domain: &'static str,
    pub name: String,
}

impl LogTarget {
    pub fn new(domain: &'static str, name: impl Into<String>) -> Self {
        Self {
            domain,
            name: name.into(),
        }
    }

    pub fn path(&self, log_root: &Path) -> PathBuf {
        log_root
            .join(format!("{}_logs", self.domain))
            .join(format!("{}.log", self.name))
    }
}

/// Opens the log file of a target, creating its directory.
fn open_file(log_root: &Path, target: &LogTarget) -> Result<(NonBlocking, WorkerGuard, PathBuf), MigrationError> {
    let path = target.path(log_root);
    let dir = path
        .parent()
        .ok_or_else(|| MigrationError::Logging(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)?;
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok((writer, guard, path))
}

/// The logging state of one run.
pub struct LogContext {
    file: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LogContext {
    /// Installs the global subscriber.
    ///
    /// # Arguments
    ///
    /// * `log_root` - Directory receiving the per-domain log directories
    /// * `target` - Log file of the command, or `None` for console only
    /// * `format` - Console output format
    pub fn init(
        log_root: &Path,
        target: Option<&LogTarget>,
        format: LogFormat,
    ) -> Result<Self, MigrationError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let (file_layer, guard, file) = match target {
            Some(target) => {
                let (writer, guard, path) = open_file(log_root, target)?;
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard), Some(path))
            }
            None => (None, None, None),
        };

        let (pretty, json) = match format {
            LogFormat::Pretty => (
                Some(tracing_subscriber::fmt::layer().with_target(true).pretty()),
                None,
            ),
            LogFormat::Json => (
                None,
                Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true),
                ),
            ),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(pretty)
            .with(json)
            .with(file_layer)
            .try_init()
            .map_err(|e| MigrationError::Logging(e.to_string()))?;

        info!(
            service_name = "voxel-migrate",
            service_version = env!("CARGO_PKG_VERSION"),
            log_file = ?file,
            "Tracing initialized"
        );
        Ok(Self {
            file,
            _guard: guard,
        })
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_log_files_are_grouped_by_domain() {
        let target = LogTarget::new("invoices", "radiologist-invoices");
        assert_eq!(
            target.path(Path::new("/logs")),
            PathBuf::from("/logs/invoices_logs/radiologist-invoices.log")
        );
    }

    #[test]
    fn test_log_file_is_created_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let target = LogTarget::new("cases", "cases");

        let (mut writer, guard, path) = open_file(dir.path(), &target).unwrap();
        writer.write_all(b"processed=10\n").unwrap();
        drop(guard);

        assert_eq!(path, dir.path().join("cases_logs").join("cases.log"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "processed=10\n");
    }

    #[test]
    fn test_log_file_is_appended_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let target = LogTarget::new("maintenance", "reset");

        for line in ["first\n", "second\n"] {
            let (mut writer, guard, _) = open_file(dir.path(), &target).unwrap();
            writer.write_all(line.as_bytes()).unwrap();
            drop(guard);
        }

        let text = fs::read_to_string(target.path(dir.path())).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    #[serial]
    fn test_log_format_from_env() {
        env::set_var("LOG_FORMAT", "JSON");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);
        env::remove_var("LOG_FORMAT");
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
    }
}
