use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Intent engine error: {0}")]
    Engine(#[from] echo::EchoError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Skill error: {0}")]
    Skill(String),

    #[error("Geocoding error: {0}")]
    Geocoding(String),

    #[error("Weather service error: {0}")]
    Weather(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
