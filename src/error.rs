use crate::rules::RuleKey;

/// Failures reading or writing the durable rule record
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Malformed rule record: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Unsupported record shape: expected an object or an array, found {found}")]
    UnsupportedShape { found: &'static str },
}

/// Outcome of a rejected or partially failed `RuleStore` mutation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Rule already exists: {key}")]
    Duplicate { key: RuleKey },

    #[error("Rule not found: {key}")]
    NotFound { key: RuleKey },

    #[error("Rule pattern must not be empty")]
    EmptyPattern,

    /// The in-memory change was applied but could not be written out.
    #[error("Rule set changed but was not saved: {source}")]
    Persistence {
        #[from]
        source: PersistenceError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Invalid config file: {source}")]
    Parse {
        #[from]
        source: toml_edit::TomlError,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
