//! Plugin constructor options: the comma- and `=`-separated `-o` string,
//! plus an optional compiled regex overriding the plugin's default pattern.

use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Flag(bool),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    values: BTreeMap<String, OptionValue>,
    regex: Option<Regex>,
}

impl PluginOptions {
    /// Parse an `-o` string: `clf,limit=100` becomes
    /// `{clf: true, limit: "100"}`. Empty segments are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut values = BTreeMap::new();
        for segment in raw.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.to_string(), OptionValue::Text(value.to_string()));
                }
                None => {
                    values.insert(segment.to_string(), OptionValue::Flag(true));
                }
            }
        }
        Self {
            values,
            regex: None,
        }
    }

    pub fn set_regex(&mut self, regex: Regex) {
        self.regex = Some(regex);
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// True for `Flag(true)` and for any text value.
    pub fn is_set(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(OptionValue::Flag(flag)) => *flag,
            Some(OptionValue::Text(_)) => true,
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(OptionValue::Text(value)) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_values_parse() {
        let options = PluginOptions::parse("clf,limit=100, spaced = x ,");
        assert!(options.is_set("clf"));
        assert_eq!(options.get("limit"), Some("100"));
        assert_eq!(options.get("spaced "), Some(" x"));
        assert!(!options.is_set("missing"));
    }

    #[test]
    fn empty_string_yields_no_options() {
        let options = PluginOptions::parse("");
        assert!(!options.is_set("anything"));
    }
}
