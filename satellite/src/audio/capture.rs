//! Microphone capture: 16 kHz mono i16, delivered as 1280-sample (80 ms)
//! frames on a bounded channel.
//!
//! The cpal stream lives on its own thread for its whole lifetime. When the
//! consumer stalls (the state machine is thinking or speaking) the channel
//! fills and frames are dropped; that is what makes wake words during
//! playback inert.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use super::AudioError;

pub const CAPTURE_RATE: u32 = 16_000;
pub const FRAME_SAMPLES: usize = 1280;

/// Bounded frame queue: ~2.5 s of audio before frames start dropping.
const FRAME_QUEUE: usize = 32;

pub struct MicrophoneInput {
    frames: Receiver<Vec<i16>>,
    shutdown: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl MicrophoneInput {
    /// Open the default (or named) input device. Capture failures are fatal
    /// on the satellite, so errors propagate instead of degrading.
    pub fn open(device_name: Option<String>) -> Result<Self, AudioError> {
        let (frame_tx, frame_rx) = bounded(FRAME_QUEUE);
        let shutdown = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicU64::new(0));

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_shutdown = Arc::clone(&shutdown);
        let thread_dropped = Arc::clone(&dropped);

        thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                capture_thread(device_name, frame_tx, ready_tx, thread_shutdown, thread_dropped)
            })
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::Stream("capture thread exited during setup".to_string()))??;

        log::info!("Microphone capture started ({} Hz mono)", CAPTURE_RATE);

        Ok(MicrophoneInput {
            frames: frame_rx,
            shutdown,
            dropped,
        })
    }

    /// The frame stream; clones share the same queue.
    pub fn frames(&self) -> Receiver<Vec<i16>> {
        self.frames.clone()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn capture_thread(
    device_name: Option<String>,
    frames: Sender<Vec<i16>>,
    ready: mpsc::Sender<Result<(), AudioError>>,
    shutdown: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
) {
    let stream = match build_stream(device_name, frames, dropped) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // The stream delivers audio from its callback thread; this thread only
    // keeps it alive.
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    drop(stream);
    log::debug!("Capture thread stopped");
}

fn build_stream(
    device_name: Option<String>,
    frames: Sender<Vec<i16>>,
    dropped: Arc<AtomicU64>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();

    let device = match &device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::Device(format!("input device '{}' not found", name)))?,
        None => host
            .default_input_device()
            .ok_or_else(|| AudioError::Device("no default input device".to_string()))?,
    };

    log::info!("Using input device: {}", device.name()?);

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(CAPTURE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut pending: Vec<i16> = Vec::with_capacity(FRAME_SAMPLES * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            pending.extend_from_slice(data);

            while pending.len() >= FRAME_SAMPLES {
                let frame: Vec<i16> = pending.drain(..FRAME_SAMPLES).collect();
                if frames.try_send(frame).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        },
        |err| log::error!("Capture stream error: {}", err),
        None,
    )?;

    stream.play()?;
    Ok(stream)
}
