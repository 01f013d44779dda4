//! Usage: Process-wide tracing setup (stderr + daily rolling file under the app `logs/` dir).

use crate::infra::settings::AppSettings;
use crate::shared::error::AppResult;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "delocalise";
const LOG_FILE_SUFFIX: &str = "log";
const FALLBACK_FILTER: &str = "info";

/// Keeps the file writer flushing; dropping it loses buffered lines.
#[derive(Debug)]
pub struct LoggingGuard {
    _file: WorkerGuard,
}

/// `RUST_LOG` wins over the persisted `log_filter`.
fn build_filter(settings: &AppSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_filter.trim()))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

fn file_writer(logs_dir: &Path, retention_days: u32) -> AppResult<(NonBlocking, WorkerGuard)> {
    let appender = RollingBuilder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(retention_days.max(1) as usize)
        .build(logs_dir)
        .map_err(|e| format!("SYSTEM_ERROR: failed to create log file appender: {e}"))?;
    Ok(tracing_appender::non_blocking(appender))
}

pub fn init(logs_dir: &Path, settings: &AppSettings) -> AppResult<LoggingGuard> {
    let (file, guard) = file_writer(logs_dir, settings.log_retention_days)?;

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(settings))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false),
        );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed; keeping the existing one");
    }
    // Route `log` records from dependencies through tracing.
    let _ = tracing_log::LogTracer::init();

    // Payload is not logged; it may carry titles or tokens.
    std::panic::set_hook(Box::new(|info| match info.location() {
        Some(location) => tracing::error!(
            file = location.file(),
            line = location.line(),
            "panic"
        ),
        None => tracing::error!("panic at unknown location"),
    }));

    tracing::info!(
        logs_dir = %logs_dir.display(),
        retention_days = settings.log_retention_days,
        "logging initialized"
    );
    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn invalid_filter_falls_back_to_info() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let settings = AppSettings {
            log_filter: "delocalise=[[[".to_string(),
            ..AppSettings::default()
        };
        assert_eq!(build_filter(&settings).to_string(), FALLBACK_FILTER);
    }

    #[test]
    fn file_writer_creates_prefixed_log_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let (mut writer, guard) = file_writer(dir.path(), 3).expect("writer");
            writer.write_all(b"hello\n").expect("write");
            drop(guard);
        }

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|name| name.starts_with(LOG_FILE_PREFIX)));
    }
}
