//! Logging bootstrap.
//!
//! Records carry the local timestamp (`YYYY/MM/DD HH:MM:SS`) and the PID,
//! then level and message. `RUST_LOG` overrides the configured level, and
//! `--log-file` redirects output from stderr to an append-opened file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Level name; invalid names are a configuration error.
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

struct StampWithPid;

impl FormatTime for StampWithPid {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{} [{}]",
            chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
            std::process::id()
        )
    }
}

pub fn init(options: &LogOptions) -> Result<()> {
    let level = options.level.as_deref().unwrap_or("info");
    let level: tracing::Level = level
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid log level '{level}'"))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(StampWithPid)
        .with_target(false);

    match &options.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Arc::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
