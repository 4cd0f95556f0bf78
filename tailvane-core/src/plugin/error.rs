use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin '{name}'")]
    Unknown { name: String },

    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid options for plugin '{plugin}': {reason}")]
    InvalidOptions { plugin: &'static str, reason: String },
}
