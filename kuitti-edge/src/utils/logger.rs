//! Logging Infrastructure
//!
//! Console output plus an optional daily rotating file. `RUST_LOG` overrides
//! the configured level.

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate, TimeZone};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Rolling file prefix; files are named `kuitti.YYYY-MM-DD`
const LOG_PREFIX: &str = "kuitti";

/// Days a rotated log file is kept
const RETENTION_DAYS: i64 = 14;

/// Delete rotated log files older than the retention window
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<usize> {
    let cutoff = Local::now() - chrono::Duration::days(RETENTION_DAYS);
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(date_part) = name.strip_prefix(LOG_PREFIX).and_then(|d| d.strip_prefix('.'))
            && let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && let Some(midnight) = date.and_hms_opt(0, 0, 0)
            && let Some(local) = Local.from_local_datetime(&midnight).single()
            && local < cutoff
        {
            fs::remove_file(&path)?;
            removed += 1;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }

    Ok(removed)
}

/// Initialize logging
///
/// # Arguments
/// * `level` - default level (`info`, `debug`, ...)
/// * `log_dir` - optional directory for the daily rotating file
///
/// # Examples
/// ```no_run
/// kuitti_edge::utils::logger::init_logger_with_file("info", Some("./logs"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger_with_file(level: &str, log_dir: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        fs::create_dir_all(log_dir)?;

        let file_log = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_PREFIX);
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_writer(std::sync::Mutex::new(file_log))
            .with_filter(EnvFilter::new(level));

        subscriber.with(console_layer).with(file_layer).try_init()?;

        if let Err(e) = cleanup_old_logs(log_dir) {
            tracing::warn!(error = %e, "Log cleanup failed");
        }
    } else {
        subscriber.with(console_layer).try_init()?;
    }

    Ok(())
}
