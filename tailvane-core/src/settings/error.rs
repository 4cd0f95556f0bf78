use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid zone name '{name}' (allowed: [A-Za-z0-9_-]+)")]
    InvalidZoneName { name: String },

    #[error("invalid identity '{identity}' (word characters only)")]
    InvalidIdentity { identity: String },

    #[error("invalid wildcard pattern '{pattern}': {source}")]
    InvalidWildcard {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid timer spec '{spec}': {reason}")]
    InvalidTimer { spec: String, reason: &'static str },

    #[error("timer zone '{zone}' is not an active zone")]
    TimerZoneUnknown { zone: String },

    #[error("invalid listen address '{addr}': {source}")]
    InvalidListenAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid parse-error level '{level}'")]
    InvalidParseErrorLevel { level: String },

    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read regex file {path}: {source}")]
    RegexFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin override files are not supported; plugins are compiled in")]
    OverrideUnsupported,

    #[error("windows-num must be at least 1")]
    WindowsNumZero,

    #[error("{name} must be at least one second")]
    PeriodZero { name: &'static str },

    #[error("no wildcards configured")]
    NoWildcards,
}
