//! The listener worker: a dedicated thread that owns wake detection, VAD
//! endpointing and transcription. The state machine drives it with
//! commands over a bounded channel and receives events back on an async
//! channel; all model state stays on this one thread.

use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::asr::Transcriber;
use crate::config::{AsrConfig, WakeConfig};
use crate::debug;
use crate::endpoint::{EndpointConfig, FeedOutcome, VadEndpointer, WebRtcClassifier};
use crate::error::{Result, SatelliteError};
use crate::wake::{WakeEvent, WakeService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenCommand {
    /// Block on the frame stream until a wake phrase fires.
    AwaitWake,
    /// Capture until the endpoint, then transcribe.
    Capture,
}

#[derive(Debug, Clone)]
pub enum ListenEvent {
    Wake(WakeEvent),
    Utterance { text: String, samples: usize },
    Failed(String),
}

pub struct ListenerHandle {
    commands: Sender<ListenCommand>,
    events: tokio::sync::mpsc::Receiver<ListenEvent>,
}

impl ListenerHandle {
    pub fn send(&self, command: ListenCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SatelliteError::Wake("listener worker is gone".to_string()))
    }

    pub async fn next_event(&mut self) -> Option<ListenEvent> {
        self.events.recv().await
    }

    /// Assemble a handle from raw channels; the seam tests drive events
    /// through.
    pub fn from_channels(
        commands: Sender<ListenCommand>,
        events: tokio::sync::mpsc::Receiver<ListenEvent>,
    ) -> Self {
        ListenerHandle { commands, events }
    }
}

#[derive(Clone)]
pub struct ListenerConfig {
    pub wake: WakeConfig,
    pub asr: AsrConfig,
    pub endpoint: EndpointConfig,
    pub capture_dir: Option<PathBuf>,
}

/// Start the worker thread. Wake models and the transcriber are built on
/// the thread itself; a construction failure is reported back before this
/// returns.
pub fn spawn_listener(
    frames: Receiver<Vec<i16>>,
    config: ListenerConfig,
) -> Result<ListenerHandle> {
    let (command_tx, command_rx) = bounded(4);
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(4);
    let (init_tx, init_rx) = std::sync::mpsc::channel();

    thread::Builder::new()
        .name("listener".to_string())
        .spawn(move || {
            let wake = match WakeService::from_config(&config.wake) {
                Ok(wake) => wake,
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };
            let transcriber = match Transcriber::from_config(&config.asr) {
                Ok(transcriber) => transcriber,
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            let mut worker = ListenerWorker {
                frames,
                wake,
                transcriber,
                endpoint: config.endpoint,
                capture_dir: config.capture_dir,
            };
            worker.run(command_rx, event_tx);
        })
        .map_err(|e| SatelliteError::Wake(format!("listener thread: {}", e)))?;

    init_rx
        .recv()
        .map_err(|_| SatelliteError::Wake("listener thread died during init".to_string()))??;

    Ok(ListenerHandle {
        commands: command_tx,
        events: event_rx,
    })
}

struct ListenerWorker {
    frames: Receiver<Vec<i16>>,
    wake: WakeService,
    transcriber: Transcriber,
    endpoint: EndpointConfig,
    capture_dir: Option<PathBuf>,
}

impl ListenerWorker {
    fn run(
        &mut self,
        commands: Receiver<ListenCommand>,
        events: tokio::sync::mpsc::Sender<ListenEvent>,
    ) {
        while let Ok(command) = commands.recv() {
            let event = match command {
                ListenCommand::AwaitWake => self.await_wake(),
                ListenCommand::Capture => self.capture_and_transcribe(),
            };

            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    log::error!("Listener command failed: {}", e);
                    ListenEvent::Failed(e.to_string())
                }
            };

            if events.blocking_send(event).is_err() {
                break;
            }
        }

        log::debug!("Listener worker stopped");
    }

    fn await_wake(&mut self) -> Result<ListenEvent> {
        // Frames queued while we were thinking or speaking are stale; the
        // detector must start clean so the tail of old audio cannot fire.
        let mut drained = 0usize;
        while self.frames.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            log::debug!("Drained {} stale frames before listening", drained);
        }
        self.wake.reset();

        loop {
            let frame = self
                .frames
                .recv()
                .map_err(|_| SatelliteError::Wake("capture stream closed".to_string()))?;

            if let Some(event) = self.wake.detect(&frame)? {
                return Ok(ListenEvent::Wake(event));
            }
        }
    }

    fn capture_and_transcribe(&mut self) -> Result<ListenEvent> {
        // A fresh VAD session per capture.
        let mut endpointer = VadEndpointer::new(WebRtcClassifier::new(), self.endpoint.clone());

        loop {
            let chunk = self
                .frames
                .recv()
                .map_err(|_| SatelliteError::Vad("capture stream closed".to_string()))?;

            if endpointer.feed(&chunk)? == FeedOutcome::EndpointReached {
                break;
            }
        }

        let audio = endpointer.take_audio();
        log::debug!("Captured {} samples", audio.len());

        if let Some(dir) = &self.capture_dir {
            if let Err(e) = debug::save_capture(dir, &audio) {
                log::warn!("Could not save capture: {}", e);
            }
        }

        let text = self.transcriber.transcribe(&audio)?;

        Ok(ListenEvent::Utterance {
            text: text.trim().to_string(),
            samples: audio.len(),
        })
    }
}
