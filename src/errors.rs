//! Error types shared by the settings and section catalog layers.

use thiserror::Error;

/// Problems with user configuration: the settings file or the section catalog.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("unknown settings key `{0}`")]
    UnknownKey(String),

    #[error("invalid section catalog: {0}")]
    InvalidCatalog(String),
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
