//! Apache/NCSA access-log plugin. Handles Combined Log Format by default;
//! the `clf` option pins the stricter Common Log Format.

use crate::plugin::options::PluginOptions;
use crate::plugin::{bump, counter_lines, dump_lines, Counters, Parsed, Plugin, Scratch};
use regex::Regex;

/// Combined Log Format; the trailing referer/agent pair is optional so
/// plain CLF lines match too.
const COMBINED_PATTERN: &str =
    r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "([^"]*)" (\d{3}) (\S+)(?: "([^"]*)" "([^"]*)")?$"#;

/// Common Log Format only.
const CLF_PATTERN: &str = r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "([^"]*)" (\d{3}) (\S+)$"#;

/// Keys zeroed at zone init so counter queries are totally defined even
/// before the first matching line arrives.
const SEED_KEYS: &[&str] = &[
    "http_request",
    "http_bytes",
    "http_status_1xx",
    "http_status_2xx",
    "http_status_3xx",
    "http_status_4xx",
    "http_status_5xx",
    "http_method_get",
    "http_method_post",
    "http_version_1_0",
    "http_version_1_1",
    "malformed_request",
];

#[derive(Debug)]
pub struct ApachePlugin {
    regex: Regex,
}

impl ApachePlugin {
    pub fn new(options: &PluginOptions) -> Self {
        let regex = match options.regex() {
            Some(regex) => regex.clone(),
            None if options.is_set("clf") => {
                Regex::new(CLF_PATTERN).expect("builtin CLF pattern compiles")
            }
            None => Regex::new(COMBINED_PATTERN).expect("builtin combined pattern compiles"),
        };
        Self { regex }
    }
}

impl Plugin for ApachePlugin {
    fn init_zone(&self, _zone: &str, public: &mut Counters, _private: &mut Scratch, _window: &mut Counters) {
        for key in SEED_KEYS {
            public.entry(key.to_string()).or_insert(0.0);
        }
    }

    fn process_line(&self, line: &str) -> Option<Parsed> {
        let caps = self.regex.captures(line)?;
        Some(vec![
            caps.get(5)?.as_str().to_string(),
            caps.get(6)?.as_str().to_string(),
            caps.get(7)?.as_str().to_string(),
        ])
    }

    fn process_data(
        &self,
        parsed: &Parsed,
        public: &mut Counters,
        _private: &mut Scratch,
        window: &mut Counters,
    ) {
        let [request, status, bytes] = parsed.as_slice() else {
            return;
        };

        bump(public, window, "http_request", 1.0);

        if let Ok(n) = bytes.parse::<f64>() {
            bump(public, window, "http_bytes", n);
        }

        if let Some(class) = status.chars().next() {
            bump(public, window, &format!("http_status_{class}xx"), 1.0);
        }

        match parse_request(request) {
            Some((method, version)) => {
                bump(public, window, &format!("http_method_{method}"), 1.0);
                bump(public, window, &format!("http_version_{version}"), 1.0);
            }
            None => bump(public, window, "malformed_request", 1.0),
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

/// Split `"GET /index.html HTTP/1.0"` into counter key fragments
/// (`get`, `1_0`). Anything else is a malformed request.
fn parse_request(request: &str) -> Option<(String, String)> {
    let mut parts = request.split_whitespace();
    let method = parts.next()?;
    let _uri = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let version = version.strip_prefix("HTTP/")?;
    let (major, minor) = version.split_once('.')?;
    if major.parse::<u8>().is_err() || minor.parse::<u8>().is_err() {
        return None;
    }
    Some((method.to_ascii_lowercase(), format!("{major}_{minor}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COMBINED_LINE: &str = r#"192.168.0.7 - - [02/Aug/2026:10:14:02 +0000] "GET /index.html HTTP/1.0" 200 2326 "http://example.org/start.html" "Mozilla/5.0""#;
    const CLF_LINE: &str =
        r#"10.0.0.1 - frank [02/Aug/2026:10:14:03 +0000] "POST /cgi/submit HTTP/1.1" 404 -"#;

    fn apply(plugin: &ApachePlugin, line: &str, public: &mut Counters, window: &mut Counters) -> bool {
        match plugin.process_line(line) {
            Some(parsed) => {
                let mut private = Scratch::new();
                plugin.process_data(&parsed, public, &mut private, window);
                true
            }
            None => false,
        }
    }

    #[test]
    fn combined_and_clf_lines_parse() {
        let plugin = ApachePlugin::new(&PluginOptions::default());
        assert!(plugin.process_line(COMBINED_LINE).is_some());
        assert!(plugin.process_line(CLF_LINE).is_some());
        assert!(plugin.process_line("not an access log line").is_none());
    }

    #[test]
    fn clf_option_rejects_combined_suffix() {
        let plugin = ApachePlugin::new(&PluginOptions::parse("clf"));
        assert!(plugin.process_line(CLF_LINE).is_some());
        assert!(plugin.process_line(COMBINED_LINE).is_none());
    }

    #[test]
    fn counters_accumulate_per_line() {
        let plugin = ApachePlugin::new(&PluginOptions::default());
        let mut public = Counters::new();
        let mut window = Counters::new();

        assert!(apply(&plugin, COMBINED_LINE, &mut public, &mut window));
        assert!(apply(&plugin, CLF_LINE, &mut public, &mut window));

        assert_eq!(public["http_request"], 2.0);
        assert_eq!(public["http_status_2xx"], 1.0);
        assert_eq!(public["http_status_4xx"], 1.0);
        assert_eq!(public["http_method_get"], 1.0);
        assert_eq!(public["http_method_post"], 1.0);
        assert_eq!(public["http_version_1_0"], 1.0);
        assert_eq!(public["http_version_1_1"], 1.0);
        assert_eq!(public["http_bytes"], 2326.0);
        assert_eq!(window["http_request"], 2.0);
    }

    #[test]
    fn garbage_request_field_counts_as_malformed() {
        let plugin = ApachePlugin::new(&PluginOptions::default());
        let mut public = Counters::new();
        let mut window = Counters::new();
        let line = r#"10.0.0.2 - - [02/Aug/2026:10:15:00 +0000] "-" 400 0"#;

        assert!(apply(&plugin, line, &mut public, &mut window));
        assert_eq!(public["http_request"], 1.0);
        assert_eq!(public["malformed_request"], 1.0);
        assert!(!public.contains_key("http_method_get"));
    }

    #[test]
    fn init_zone_seeds_counters_and_is_idempotent() {
        let plugin = ApachePlugin::new(&PluginOptions::default());
        let mut public = Counters::new();
        let mut private = Scratch::new();
        let mut window = Counters::new();

        plugin.init_zone("a", &mut public, &mut private, &mut window);
        assert_eq!(public["malformed_request"], 0.0);

        public.insert("http_request".to_string(), 7.0);
        plugin.init_zone("a", &mut public, &mut private, &mut window);
        assert_eq!(public["http_request"], 7.0);
    }

    #[test]
    fn stats_lines_are_sorted_key_value_pairs() {
        let plugin = ApachePlugin::new(&PluginOptions::default());
        let mut public = Counters::new();
        let mut private = Scratch::new();
        let mut window = Counters::new();
        plugin.init_zone("a", &mut public, &mut private, &mut window);
        apply(&plugin, COMBINED_LINE, &mut public, &mut window);

        let lines = plugin.stats_zone("a", &public, &private, &[]);
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert!(lines.contains(&"http_request: 1".to_string()));
        assert!(lines.contains(&"malformed_request: 0".to_string()));
    }
}
