use thiserror::Error;

use crate::audio::AudioError;
use crate::leds::driver::LedError;

pub type Result<T> = std::result::Result<T, SatelliteError>;

#[derive(Error, Debug)]
pub enum SatelliteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Wake detection error: {0}")]
    Wake(String),

    #[error("VAD error: {0}")]
    Vad(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("LED error: {0}")]
    Led(#[from] LedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
