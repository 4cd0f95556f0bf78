//! ClamAV clamd log plugin. Counts clean and infected scan results; the
//! `type` option adds a per-signature breakdown.

use crate::plugin::options::PluginOptions;
use crate::plugin::{bump, counter_lines, dump_lines, Counters, Parsed, Plugin, Scratch};
use regex::Regex;

/// Scan result lines, with or without the leading timestamp clamd writes
/// when logging to its own file:
/// `Wed Oct  8 12:00:00 2008 -> /srv/mail/x.zip: Worm.NetSky-14 FOUND`
const RESULT_PATTERN: &str = r"^(?:.* -> )?(.+?): (?:(\S+) FOUND|OK)$";

const KIND_CLEAN: &str = "clean";
const KIND_MALWARE: &str = "malware";

#[derive(Debug)]
pub struct ClamdPlugin {
    regex: Regex,
    /// Count `malware:<signature>` in addition to the aggregate.
    type_mode: bool,
}

impl ClamdPlugin {
    pub fn new(options: &PluginOptions) -> Self {
        let regex = match options.regex() {
            Some(regex) => regex.clone(),
            None => Regex::new(RESULT_PATTERN).expect("builtin clamd pattern compiles"),
        };
        Self {
            regex,
            type_mode: options.is_set("type"),
        }
    }
}

impl Plugin for ClamdPlugin {
    fn init_zone(&self, _zone: &str, public: &mut Counters, _private: &mut Scratch, _window: &mut Counters) {
        public.entry(KIND_CLEAN.to_string()).or_insert(0.0);
        public.entry(KIND_MALWARE.to_string()).or_insert(0.0);
    }

    fn process_line(&self, line: &str) -> Option<Parsed> {
        let caps = self.regex.captures(line)?;
        match caps.get(2) {
            Some(signature) => Some(vec![
                KIND_MALWARE.to_string(),
                signature.as_str().to_string(),
            ]),
            None => Some(vec![KIND_CLEAN.to_string(), String::new()]),
        }
    }

    fn process_data(
        &self,
        parsed: &Parsed,
        public: &mut Counters,
        _private: &mut Scratch,
        window: &mut Counters,
    ) {
        let [kind, signature] = parsed.as_slice() else {
            return;
        };

        bump(public, window, kind, 1.0);
        if self.type_mode && kind == KIND_MALWARE && !signature.is_empty() {
            bump(public, window, &format!("{KIND_MALWARE}:{signature}"), 1.0);
        }
    }

    fn stats_zone(
        &self,
        _zone: &str,
        public: &Counters,
        _private: &Scratch,
        _windows: &[Counters],
    ) -> Vec<String> {
        counter_lines(public)
    }

    fn dump_zone(
        &self,
        _zone: &str,
        public: &Counters,
        private: &Scratch,
        windows: &[Counters],
    ) -> Vec<String> {
        dump_lines(public, private, windows)
    }
}
