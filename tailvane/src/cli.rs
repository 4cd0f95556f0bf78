//! Turn parsed command-line arguments into validated engine settings.

use crate::Cli;
use anyhow::Result;
use regex::Regex;
use std::net::SocketAddr;
use std::time::Duration;
use tailvane_core::plugin::options::PluginOptions;
use tailvane_core::plugin::ParseErrorLevel;
use tailvane_core::settings::{
    assemble_zones, parse_timer_spec, Settings, SettingsError, TimerSpec, DEFAULT_DATABASE,
};

pub fn build_settings(cli: &Cli) -> Result<Settings> {
    if !cli.override_from.is_empty() {
        return Err(SettingsError::OverrideUnsupported.into());
    }

    let zones = assemble_zones(&cli.wildcards, &cli.aggregate_zone, cli.basename)?;

    let mut plugin_options = PluginOptions::parse(cli.options.as_deref().unwrap_or(""));
    if let Some(pattern) = regex_override(cli)? {
        let regex = Regex::new(&pattern).map_err(|source| SettingsError::InvalidRegex {
            pattern: pattern.clone(),
            source,
        })?;
        plugin_options.set_regex(regex);
    }

    let parse_error = match &cli.parse_error {
        Some(level) => Some(ParseErrorLevel::parse(level).ok_or_else(|| {
            SettingsError::InvalidParseErrorLevel {
                level: level.clone(),
            }
        })?),
        None => None,
    };

    let listen: SocketAddr =
        cli.listen
            .parse()
            .map_err(|source| SettingsError::InvalidListenAddr {
                addr: cli.listen.clone(),
                source,
            })?;

    let timers: Vec<TimerSpec> = cli
        .timer
        .iter()
        .map(|spec| parse_timer_spec(spec))
        .collect::<Result<_, _>>()?;

    let mut settings = Settings::new(cli.plugin.clone(), zones);
    settings.database = cli
        .database
        .clone()
        .unwrap_or_else(|| DEFAULT_DATABASE.into());
    settings.listen = listen;
    settings.multiple = cli.multiple;
    settings.change_dir = cli.change_dir.clone();
    settings.identity = cli.identity.clone();
    settings.expand_period = Duration::from_secs(cli.expand_period);
    settings.store_period = Duration::from_secs(cli.store_period);
    settings.window_size = Duration::from_secs(cli.window_size);
    settings.windows_num = cli.windows_num;
    settings.plugin_options = plugin_options;
    settings.parse_error = parse_error;
    settings.timers = timers;

    settings.validate()?;
    Ok(settings)
}

fn regex_override(cli: &Cli) -> Result<Option<String>> {
    if let Some(pattern) = &cli.regex {
        return Ok(Some(pattern.clone()));
    }
    if let Some(path) = &cli.regex_from {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::RegexFile {
            path: path.clone(),
            source,
        })?;
        return Ok(Some(raw.trim_end_matches('\n').to_string()));
    }
    Ok(None)
}
