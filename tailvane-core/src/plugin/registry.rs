//! Fixed registry of built-in plugins, keyed by name.
//!
//! There is no runtime plugin loading: every plugin is compiled in, and the
//! `--override-from` surface is rejected at configuration time.

use crate::plugin::apache::ApachePlugin;
use crate::plugin::clamd::ClamdPlugin;
use crate::plugin::options::PluginOptions;
use crate::plugin::{Plugin, PluginError};
use regex::Regex;
use std::collections::HashMap;

type PluginBuilder = fn(&PluginOptions) -> Result<Box<dyn Plugin>, PluginError>;

fn build_apache(options: &PluginOptions) -> Result<Box<dyn Plugin>, PluginError> {
    Ok(Box::new(ApachePlugin::new(options)))
}

fn build_clamd(options: &PluginOptions) -> Result<Box<dyn Plugin>, PluginError> {
    Ok(Box::new(ClamdPlugin::new(options)))
}

fn builtin_builders() -> HashMap<&'static str, PluginBuilder> {
    let mut map = HashMap::new();
    map.insert("apache", build_apache as PluginBuilder);
    map.insert("clamd", build_clamd as PluginBuilder);
    map
}

/// Build the named plugin. A `regex=` option in the `-o` string is compiled
/// here so constructors always receive a ready matcher.
pub fn build_plugin(name: &str, options: &PluginOptions) -> Result<Box<dyn Plugin>, PluginError> {
    let builder = *builtin_builders()
        .get(name)
        .ok_or_else(|| PluginError::Unknown {
            name: name.to_string(),
        })?;

    let mut options = options.clone();
    if options.regex().is_none() {
        if let Some(pattern) = options.get("regex") {
            let regex = Regex::new(pattern).map_err(|source| PluginError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
            options.set_regex(regex);
        }
    }

    builder(&options)
}
