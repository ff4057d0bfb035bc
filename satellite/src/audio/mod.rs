//! Blocking audio I/O. Capture and playback each own their cpal stream on a
//! dedicated thread; the rest of the satellite talks to them through
//! bounded channels.

pub mod capture;
pub mod playback;

pub use capture::{MicrophoneInput, CAPTURE_RATE, FRAME_SAMPLES};
pub use playback::{SpeakerHandle, SpeakerOutput, CHUNK_SAMPLES, PLAYBACK_RATE};

use cpal::{BuildStreamError, DefaultStreamConfigError, DeviceNameError, DevicesError, PlayStreamError};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AudioError {
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Audio channel closed: {0}")]
    ChannelClosed(String),
}

impl From<DevicesError> for AudioError {
    fn from(err: DevicesError) -> Self {
        AudioError::Device(err.to_string())
    }
}

impl From<DeviceNameError> for AudioError {
    fn from(err: DeviceNameError) -> Self {
        AudioError::Device(err.to_string())
    }
}

impl From<DefaultStreamConfigError> for AudioError {
    fn from(err: DefaultStreamConfigError) -> Self {
        AudioError::Device(err.to_string())
    }
}

impl From<BuildStreamError> for AudioError {
    fn from(err: BuildStreamError) -> Self {
        AudioError::Stream(err.to_string())
    }
}

impl From<PlayStreamError> for AudioError {
    fn from(err: PlayStreamError) -> Self {
        AudioError::Stream(err.to_string())
    }
}

/// Input device names, for `--list-devices`.
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host.input_devices()? {
        names.push(device.name()?);
    }
    Ok(names)
}

/// Output device names, for `--list-devices`.
pub fn list_output_devices() -> Result<Vec<String>, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host.output_devices()? {
        names.push(device.name()?);
    }
    Ok(names)
}
