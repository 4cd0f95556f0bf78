//! The plugin interface: the only coupling between the engine and the
//! per-log-format parsing and accounting logic.
//!
//! A plugin is a trait object built once at startup from the registry. All
//! callbacks run inside the engine's event handlers and must not block.

pub mod apache;
pub mod clamd;
mod error;
pub mod options;
pub mod registry;

pub use error::PluginError;
pub use registry::build_plugin;

use std::collections::BTreeMap;

/// Long-term and per-window counters. `BTreeMap` keeps reply lines sorted.
pub type Counters = BTreeMap<String, f64>;

/// Plugin-owned scratch state, opaque to clients, persisted as JSON.
pub type Scratch = BTreeMap<String, serde_json::Value>;

/// Fields extracted from one log line by `process_line`.
pub type Parsed = Vec<String>;

/// Log level for lines the plugin could not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorLevel {
    Debug,
    Info,
    Warn,
    Error,
    /// Suppress unparsable-line logging entirely.
    None,
}

impl ParseErrorLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// A parse-and-accumulate strategy for one log format.
///
/// `process_window` and `process_timer` have default implementations so a
/// plugin only overrides the dispatch points it cares about.
pub trait Plugin: Send + std::fmt::Debug {
    /// Suggested level for unparsable lines; the `--parse-error` option
    /// overrides it.
    fn parse_error_default(&self) -> ParseErrorLevel {
        ParseErrorLevel::Debug
    }

    /// Called once per zone after load or fresh creation. Must be
    /// idempotent: the engine calls it unconditionally on every start.
    fn init_zone(&self, zone: &str, public: &mut Counters, private: &mut Scratch, window: &mut Counters);

    /// Apply the regex and any semantic validation. `None` marks the line
    /// unparsable; counters stay untouched.
    fn process_line(&self, line: &str) -> Option<Parsed>;

    /// Account one parsed line into a zone. Called once per subscribed zone.
    fn process_data(
        &self,
        parsed: &Parsed,
        public: &mut Counters,
        private: &mut Scratch,
        window: &mut Counters,
    );

    /// Window rollover. The just-completed window is still at index 0; the
    /// engine prepends the new empty window only after this returns.
    fn process_window(&self, _public: &mut Counters, _private: &mut Scratch, _windows: &mut Vec<Counters>) {}

    /// Named timer fired. Return `true` to re-arm.
    fn process_timer(
        &self,
        _name: &str,
        _public: &mut Counters,
        _private: &mut Scratch,
        _windows: &mut Vec<Counters>,
    ) -> bool {
        false
    }

    /// Reply lines for the `stats` command, sorted. `windows` holds
    /// completed windows only.
    fn stats_zone(
        &self,
        zone: &str,
        public: &Counters,
        private: &Scratch,
        windows: &[Counters],
    ) -> Vec<String>;

    /// Reply lines for the `dump` command. `windows` holds completed
    /// windows only.
    fn dump_zone(
        &self,
        zone: &str,
        public: &Counters,
        private: &Scratch,
        windows: &[Counters],
    ) -> Vec<String>;
}

/// Add `n` to a counter in both the long-term and current-window maps.
pub(crate) fn bump(public: &mut Counters, window: &mut Counters, key: &str, n: f64) {
    *public.entry(key.to_string()).or_insert(0.0) += n;
    *window.entry(key.to_string()).or_insert(0.0) += n;
}

/// `<key>: <value>` per public counter. `BTreeMap` iteration keeps the
/// lines sorted; f64 `Display` preserves float artifacts verbatim.
pub(crate) fn counter_lines(public: &Counters) -> Vec<String> {
    public.iter().map(|(k, v)| format!("{k}: {v}")).collect()
}

/// Full-state dump: public counters, private scratch, completed windows.
pub(crate) fn dump_lines(public: &Counters, private: &Scratch, windows: &[Counters]) -> Vec<String> {
    let mut lines = Vec::new();
    for (k, v) in public {
        lines.push(format!("public:{k}: {v}"));
    }
    for (k, v) in private {
        lines.push(format!("private:{k}: {v}"));
    }
    for (i, window) in windows.iter().enumerate() {
        for (k, v) in window {
            lines.push(format!("window:{i}:{k}: {v}"));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_level_accepts_known_names() {
        assert_eq!(ParseErrorLevel::parse("debug"), Some(ParseErrorLevel::Debug));
        assert_eq!(ParseErrorLevel::parse("WARN"), Some(ParseErrorLevel::Warn));
        assert_eq!(ParseErrorLevel::parse("none"), Some(ParseErrorLevel::None));
        assert_eq!(ParseErrorLevel::parse("verbose"), None);
    }

    #[test]
    fn bump_updates_both_maps() {
        let mut public = Counters::new();
        let mut window = Counters::new();
        bump(&mut public, &mut window, "hits", 1.0);
        bump(&mut public, &mut window, "hits", 2.0);
        assert_eq!(public["hits"], 3.0);
        assert_eq!(window["hits"], 3.0);
    }

    #[test]
    fn counter_lines_render_whole_numbers_without_fraction() {
        let mut public = Counters::new();
        public.insert("http_request".to_string(), 200.0);
        public.insert("last_spam_rate".to_string(), 9566.70000000001);
        assert_eq!(
            counter_lines(&public),
            vec![
                "http_request: 200".to_string(),
                "last_spam_rate: 9566.70000000001".to_string(),
            ]
        );
    }
}
