//! Speaker playback: 22 050 Hz mono i16, fed in 2048-sample chunks through
//! a bounded command channel. A flush command acknowledges once the queued
//! audio has fully drained to the device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use super::AudioError;

pub const PLAYBACK_RATE: u32 = 22_050;
pub const CHUNK_SAMPLES: usize = 2048;

const COMMAND_QUEUE: usize = 64;

enum PlaybackCommand {
    Chunk(Vec<i16>),
    /// Acknowledge once the ring has drained to the device.
    Flush(mpsc::Sender<()>),
}

pub struct SpeakerOutput {
    commands: Sender<PlaybackCommand>,
    shutdown: Arc<AtomicBool>,
}

/// Cheap handle for the playback queue, cloneable across threads.
#[derive(Clone)]
pub struct SpeakerHandle {
    commands: Sender<PlaybackCommand>,
}

impl SpeakerOutput {
    pub fn open(device_name: Option<String>) -> Result<Self, AudioError> {
        let (command_tx, command_rx) = bounded(COMMAND_QUEUE);
        let shutdown = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_shutdown = Arc::clone(&shutdown);

        thread::Builder::new()
            .name("speaker".to_string())
            .spawn(move || playback_thread(device_name, command_rx, ready_tx, thread_shutdown))
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::Stream("playback thread exited during setup".to_string()))??;

        log::info!("Speaker playback started ({} Hz mono)", PLAYBACK_RATE);

        Ok(SpeakerOutput {
            commands: command_tx,
            shutdown,
        })
    }

    pub fn handle(&self) -> SpeakerHandle {
        SpeakerHandle {
            commands: self.commands.clone(),
        }
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl SpeakerHandle {
    /// Queue samples for playback, split into device chunks with the final
    /// chunk zero-padded.
    pub fn play(&self, samples: &[i16]) -> Result<(), AudioError> {
        for chunk in samples.chunks(CHUNK_SAMPLES) {
            let mut padded = chunk.to_vec();
            padded.resize(CHUNK_SAMPLES, 0);
            self.commands
                .send(PlaybackCommand::Chunk(padded))
                .map_err(|_| AudioError::ChannelClosed("playback queue".to_string()))?;
        }
        Ok(())
    }

    /// Queue an already chunk-aligned buffer without padding bookkeeping.
    pub fn play_chunk(&self, chunk: Vec<i16>) -> Result<(), AudioError> {
        self.commands
            .send(PlaybackCommand::Chunk(chunk))
            .map_err(|_| AudioError::ChannelClosed("playback queue".to_string()))
    }

    /// Block until everything queued so far has played out.
    pub fn flush(&self) -> Result<(), AudioError> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.commands
            .send(PlaybackCommand::Flush(ack_tx))
            .map_err(|_| AudioError::ChannelClosed("playback queue".to_string()))?;
        ack_rx
            .recv()
            .map_err(|_| AudioError::ChannelClosed("playback ack".to_string()))
    }
}

fn playback_thread(
    device_name: Option<String>,
    commands: Receiver<PlaybackCommand>,
    ready: mpsc::Sender<Result<(), AudioError>>,
    shutdown: Arc<AtomicBool>,
) {
    let ring: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));

    let stream = match build_stream(device_name, Arc::clone(&ring)) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while !shutdown.load(Ordering::Relaxed) {
        match commands.recv_timeout(Duration::from_millis(100)) {
            Ok(PlaybackCommand::Chunk(chunk)) => {
                if let Ok(mut ring) = ring.lock() {
                    ring.extend(chunk);
                }
            }
            Ok(PlaybackCommand::Flush(ack)) => {
                // Wait for the device callback to drain the ring.
                loop {
                    let remaining = ring.lock().map(|r| r.len()).unwrap_or(0);
                    if remaining == 0 || shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                let _ = ack.send(());
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(stream);
    log::debug!("Playback thread stopped");
}

fn build_stream(
    device_name: Option<String>,
    ring: Arc<Mutex<VecDeque<i16>>>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();

    let device = match &device_name {
        Some(name) => host
            .output_devices()?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::Device(format!("output device '{}' not found", name)))?,
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::Device("no default output device".to_string()))?,
    };

    log::info!("Using output device: {}", device.name()?);

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(PLAYBACK_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
            let mut ring = match ring.lock() {
                Ok(ring) => ring,
                Err(_) => {
                    data.fill(0);
                    return;
                }
            };
            for sample in data.iter_mut() {
                *sample = ring.pop_front().unwrap_or(0);
            }
        },
        |err| log::error!("Playback stream error: {}", err),
        None,
    )?;

    stream.play()?;
    Ok(stream)
}
