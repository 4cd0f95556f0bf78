//! Daemon settings, assembled by the CLI front-end and validated here.
//!
//! A zone is a named bucket of log files. Zones and their wildcards are fixed
//! for the lifetime of the daemon; re-expansion changes which files are
//! watched, never which zones exist.

mod error;
mod parse;

pub use error::SettingsError;
pub use parse::{assemble_zones, is_identity, is_zone_name, parse_timer_spec};

use crate::plugin::options::PluginOptions;
use crate::plugin::ParseErrorLevel;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3638";
pub const DEFAULT_AGGREGATE_ZONE: &str = "log";
pub const DEFAULT_DATABASE: &str = "/var/lib/tailvane/state.json";
pub const DEFAULT_EXPAND_PERIOD: u64 = 60;
pub const DEFAULT_STORE_PERIOD: u64 = 10;
pub const DEFAULT_WINDOW_SIZE: u64 = 10;
pub const DEFAULT_WINDOWS_NUM: usize = 60;

/// An active zone and its configured wildcards, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSpec {
    pub name: String,
    pub wildcards: Vec<String>,
}

/// Wall-clock truncation unit for named timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl TruncUnit {
    pub fn seconds(self) -> u64 {
        match self {
            TruncUnit::Second => 1,
            TruncUnit::Minute => 60,
            TruncUnit::Hour => 3_600,
            TruncUnit::Day => 86_400,
            TruncUnit::Week => 7 * 86_400,
        }
    }
}

/// A named periodic timer, `--timer zone:name:N[wdhms]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSpec {
    pub zone: String,
    pub name: String,
    pub period: Duration,
    pub unit: TruncUnit,
}

/// Everything the engine needs to run. Built by the CLI layer (or directly
/// by tests) and validated once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub plugin: String,
    pub zones: Vec<ZoneSpec>,
    pub database: PathBuf,
    pub listen: SocketAddr,
    pub multiple: bool,
    pub change_dir: Option<PathBuf>,
    pub identity: Option<String>,
    pub expand_period: Duration,
    pub store_period: Duration,
    pub window_size: Duration,
    pub windows_num: usize,
    pub plugin_options: PluginOptions,
    /// Overrides the plugin's suggested level for unparsable lines.
    pub parse_error: Option<ParseErrorLevel>,
    pub timers: Vec<TimerSpec>,
}

impl Settings {
    /// Minimal settings for the given plugin and zone specs; everything else
    /// takes its documented default.
    pub fn new(plugin: impl Into<String>, zones: Vec<ZoneSpec>) -> Self {
        Self {
            plugin: plugin.into(),
            zones,
            database: PathBuf::from(DEFAULT_DATABASE),
            listen: DEFAULT_LISTEN.parse().expect("default listen address"),
            multiple: false,
            change_dir: None,
            identity: None,
            expand_period: Duration::from_secs(DEFAULT_EXPAND_PERIOD),
            store_period: Duration::from_secs(DEFAULT_STORE_PERIOD),
            window_size: Duration::from_secs(DEFAULT_WINDOW_SIZE),
            windows_num: DEFAULT_WINDOWS_NUM,
            plugin_options: PluginOptions::default(),
            parse_error: None,
            timers: Vec::new(),
        }
    }

    pub fn active_zone_names(&self) -> Vec<String> {
        self.zones.iter().map(|z| z.name.clone()).collect()
    }

    /// Startup validation. Violations here are configuration errors and
    /// prevent the daemon from starting.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.zones.is_empty() {
            return Err(SettingsError::NoWildcards);
        }
        for spec in &self.zones {
            if !is_zone_name(&spec.name) {
                return Err(SettingsError::InvalidZoneName {
                    name: spec.name.clone(),
                });
            }
            for pattern in &spec.wildcards {
                glob::Pattern::new(pattern).map_err(|source| SettingsError::InvalidWildcard {
                    pattern: pattern.clone(),
                    source,
                })?;
            }
        }
        if let Some(identity) = &self.identity {
            if !is_identity(identity) {
                return Err(SettingsError::InvalidIdentity {
                    identity: identity.clone(),
                });
            }
        }
        if self.windows_num == 0 {
            return Err(SettingsError::WindowsNumZero);
        }
        for (name, period) in [
            ("expand-period", self.expand_period),
            ("store-period", self.store_period),
            ("window-size", self.window_size),
        ] {
            if period < Duration::from_secs(1) {
                return Err(SettingsError::PeriodZero { name });
            }
        }
        for timer in &self.timers {
            if !self.zones.iter().any(|z| z.name == timer.zone) {
                return Err(SettingsError::TimerZoneUnknown {
                    zone: timer.zone.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str, wildcards: &[&str]) -> ZoneSpec {
        ZoneSpec {
            name: name.to_string(),
            wildcards: wildcards.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[test]
    fn minimal_settings_validate() {
        let settings = Settings::new("apache", vec![zone("a", &["/var/log/*.log"])]);
        settings.validate().unwrap();
    }

    #[test]
    fn empty_zone_list_is_rejected() {
        let settings = Settings::new("apache", Vec::new());
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::NoWildcards)
        ));
    }

    #[test]
    fn bad_zone_name_is_rejected() {
        let settings = Settings::new("apache", vec![zone("bad zone", &["/tmp/x"])]);
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidZoneName { .. })
        ));
    }

    #[test]
    fn identity_must_be_word_characters() {
        let mut settings = Settings::new("apache", vec![zone("a", &["/tmp/x"])]);
        settings.identity = Some("mail scanner".to_string());
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn timer_zone_must_be_active() {
        let mut settings = Settings::new("apache", vec![zone("a", &["/tmp/x"])]);
        settings.timers = vec![parse_timer_spec("b:daily:1d").unwrap()];
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::TimerZoneUnknown { .. })
        ));
    }

    #[test]
    fn windows_num_zero_is_rejected() {
        let mut settings = Settings::new("apache", vec![zone("a", &["/tmp/x"])]);
        settings.windows_num = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::WindowsNumZero)
        ));
    }
}
