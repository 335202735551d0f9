use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("template store {path}: {source}")]
    TemplateStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid template '{0}': {1}")]
    Template(String, String),

    #[error("capture device unavailable: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, Error>;
