use thiserror::Error;

pub type Result<T> = std::result::Result<T, EchoError>;

#[derive(Error, Debug)]
pub enum EchoError {
    #[error("Required configuration directory not found: {0}")]
    MissingDirectory(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid pattern for entity '{entity}': {reason}")]
    InvalidPattern { entity: String, reason: String },
}
