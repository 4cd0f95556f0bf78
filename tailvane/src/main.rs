mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tailvane_core::logging::{self, LogOptions};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "tailvane",
    version,
    disable_version_flag = true,
    about = "Tail log files, accumulate per-zone statistics over sliding windows, serve them over TCP"
)]
pub struct Cli {
    /// Plugin name (builtin registry: apache, clamd)
    pub plugin: String,

    /// Files to follow, each optionally prefixed with a zone name
    #[arg(value_name = "[ZONE:]WILDCARD", required = true)]
    pub wildcards: Vec<String>,

    /// Zone for wildcards without an explicit zone prefix
    #[arg(short = 'a', long = "aggregate-zone", default_value = tailvane_core::settings::DEFAULT_AGGREGATE_ZONE)]
    pub aggregate_zone: String,

    /// State database path
    #[arg(short = 'b', long = "database")]
    pub database: Option<std::path::PathBuf>,

    /// Derive zone names from each wildcard's file stem
    #[arg(long)]
    pub basename: bool,

    /// Resolve relative wildcards against this directory
    #[arg(short = 'c', long = "change-dir")]
    pub change_dir: Option<std::path::PathBuf>,

    /// Shortcut for --log-level debug
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Stay in the foreground (daemonization is left to the service manager)
    #[arg(short = 'f', long)]
    pub foreground: bool,

    /// Syslog facility (accepted for compatibility; syslog output is not compiled in)
    #[arg(long = "log-facility")]
    pub log_facility: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Append log output to this file instead of stderr
    #[arg(long = "log-file")]
    pub log_file: Option<std::path::PathBuf>,

    /// Seconds between wildcard re-expansions
    #[arg(short = 'e', long = "expand-period", default_value_t = tailvane_core::settings::DEFAULT_EXPAND_PERIOD)]
    pub expand_period: u64,

    /// Identity string (word characters only)
    #[arg(short = 'i', long)]
    pub identity: Option<String>,

    /// Query server listen address
    #[arg(short = 'l', long, default_value = tailvane_core::settings::DEFAULT_LISTEN)]
    pub listen: String,

    /// Subscribe every matching zone to a file, not just the first
    #[arg(long)]
    pub multiple: bool,

    /// Number of windows kept per zone
    #[arg(short = 'n', long = "windows-num", default_value_t = tailvane_core::settings::DEFAULT_WINDOWS_NUM)]
    pub windows_num: usize,

    /// Plugin options, comma- and '='-separated (e.g. "clf" or "type")
    #[arg(short = 'o', long = "options")]
    pub options: Option<String>,

    /// Load plugin code from a file (unsupported; plugins are compiled in)
    #[arg(long = "override-from")]
    pub override_from: Vec<std::path::PathBuf>,

    /// Pid file path
    #[arg(short = 'p', long = "pid-file")]
    pub pid_file: Option<std::path::PathBuf>,

    /// Level for unparsable lines: debug, info, warn, error, none
    #[arg(long = "parse-error")]
    pub parse_error: Option<String>,

    /// Override the plugin's line pattern
    #[arg(short = 'r', long)]
    pub regex: Option<String>,

    /// Read the line pattern override from a file
    #[arg(long = "regex-from")]
    pub regex_from: Option<std::path::PathBuf>,

    /// Seconds between state persistence passes
    #[arg(short = 's', long = "store-period", default_value_t = tailvane_core::settings::DEFAULT_STORE_PERIOD)]
    pub store_period: u64,

    /// Named timer, zone:name:N[wdhms]; repeatable
    #[arg(long = "timer")]
    pub timer: Vec<String>,

    /// Run as this user after binding
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Seconds per window
    #[arg(short = 'w', long = "window-size", default_value_t = tailvane_core::settings::DEFAULT_WINDOW_SIZE)]
    pub window_size: u64,

    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: (),
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("tailvane: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let log = LogOptions {
        level: if cli.debug {
            Some("debug".to_string())
        } else {
            cli.log_level.clone()
        },
        file: cli.log_file.clone(),
    };
    logging::init(&log)?;
    if cli.log_facility.is_some() {
        debug!("syslog output is not compiled in; logging to stderr/file");
    }
    debug!(
        foreground = cli.foreground,
        "daemonization is delegated to the service manager"
    );

    let settings = cli::build_settings(&cli)?;

    if let Some(user) = &cli.user {
        drop_privileges(user)?;
    }
    if let Some(pid_file) = &cli.pid_file {
        write_pid_file(pid_file);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the Tokio runtime")?;
    let result = runtime.block_on(tailvane_core::run(settings));

    if let Some(pid_file) = &cli.pid_file {
        if let Err(err) = std::fs::remove_file(pid_file) {
            debug!(pid_file = %pid_file.display(), error = %err, "could not remove pid file");
        }
    }
    result
}

/// Best-effort; a failed write is logged and startup continues.
fn write_pid_file(path: &Path) {
    let pid = std::process::id();
    match std::fs::write(path, format!("{pid}\n")) {
        Ok(()) => info!(pid, pid_file = %path.display(), "pid file written"),
        Err(err) => {
            warn!(pid_file = %path.display(), error = %err, "failed to write pid file; continuing");
        }
    }
}

/// Switch to the given user before the engine starts.
fn drop_privileges(name: &str) -> Result<()> {
    let user = nix::unistd::User::from_name(name)
        .with_context(|| format!("failed to look up user '{name}'"))?
        .ok_or_else(|| anyhow::anyhow!("unknown user '{name}'"))?;
    nix::unistd::setgid(user.gid).with_context(|| format!("setgid({}) failed", user.gid))?;
    nix::unistd::setuid(user.uid).with_context(|| format!("setuid({}) failed", user.uid))?;
    debug!(user = name, "dropped privileges");
    Ok(())
}
