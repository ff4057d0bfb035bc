//! The Ember satellite: an edge voice frontend that wakes on a keyword,
//! records until the speaker pauses, transcribes locally, asks the core
//! over HTTP and speaks the reply, with a lantern of addressable LEDs
//! mirroring every state.

pub mod asr;
pub mod audio;
pub mod client;
pub mod config;
pub mod debug;
pub mod endpoint;
pub mod error;
pub mod leds;
pub mod listener;
pub mod runner;
pub mod tts;
pub mod wake;

pub use client::CoreClient;
pub use config::Config;
pub use error::{Result, SatelliteError};
pub use runner::{run_forever, Satellite, State};
