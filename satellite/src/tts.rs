//! Speech synthesis adapters. Piper runs as a child process emitting raw
//! s16le PCM on stdout; chunks are yielded as they arrive so playback can
//! start before synthesis finishes.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::audio::{SpeakerHandle, CHUNK_SAMPLES};
use crate::config::{TtsConfig, TtsKind};
use crate::error::{Result, SatelliteError};
use crate::runner::SpeechOutput;

const STREAM_READ_BYTES: usize = 4096;

pub enum Synthesizer {
    Piper(PiperTts),
}

impl Synthesizer {
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        match config.kind {
            TtsKind::Piper => Ok(Synthesizer::Piper(PiperTts::new(config))),
        }
    }

    /// Synthesize `text` into a stream of PCM chunks.
    pub fn synthesize(&self, text: &str) -> Result<PcmStream> {
        match self {
            Synthesizer::Piper(piper) => piper.synthesize(text),
        }
    }
}

pub struct PiperTts {
    binary: PathBuf,
    model: PathBuf,
}

impl PiperTts {
    pub fn new(config: &TtsConfig) -> Self {
        PiperTts {
            binary: PathBuf::from(config.binary.as_deref().unwrap_or("piper")),
            model: PathBuf::from(&config.model_path),
        }
    }

    pub fn synthesize(&self, text: &str) -> Result<PcmStream> {
        log::debug!("Synthesizing {} chars with piper", text.len());

        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.model)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SatelliteError::Synthesis(format!(
                    "failed to start {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .and_then(|_| stdin.write_all(b"\n"))
                .map_err(|e| SatelliteError::Synthesis(format!("piper stdin: {}", e)))?;
            // Dropping stdin closes it; piper synthesizes and exits.
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SatelliteError::Synthesis("piper stdout unavailable".to_string()))?;

        Ok(PcmStream {
            child,
            stdout,
            carry: None,
            finished: false,
        })
    }
}

/// Streaming PCM from a synthesis child process.
pub struct PcmStream {
    child: Child,
    stdout: ChildStdout,
    /// Odd byte held over between reads.
    carry: Option<u8>,
    finished: bool,
}

impl Iterator for PcmStream {
    type Item = Result<Vec<i16>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buffer = [0u8; STREAM_READ_BYTES];
        loop {
            match self.stdout.read(&mut buffer) {
                Ok(0) => {
                    self.finished = true;
                    match self.child.wait() {
                        Ok(status) if status.success() => return None,
                        Ok(status) => {
                            return Some(Err(SatelliteError::Synthesis(format!(
                                "piper exited with {}",
                                status
                            ))))
                        }
                        Err(e) => {
                            return Some(Err(SatelliteError::Synthesis(format!(
                                "piper wait: {}",
                                e
                            ))))
                        }
                    }
                }
                Ok(read) => {
                    let mut bytes = Vec::with_capacity(read + 1);
                    if let Some(carry) = self.carry.take() {
                        bytes.push(carry);
                    }
                    bytes.extend_from_slice(&buffer[..read]);

                    if bytes.len() % 2 != 0 {
                        self.carry = bytes.pop();
                    }
                    if bytes.is_empty() {
                        continue;
                    }

                    let samples: Vec<i16> = bytes
                        .chunks_exact(2)
                        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                        .collect();
                    return Some(Ok(samples));
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(SatelliteError::Synthesis(format!(
                        "piper stdout: {}",
                        e
                    ))));
                }
            }
        }
    }
}

impl Drop for PcmStream {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Synthesis wired to the speaker: re-chunks the stream to the device
/// chunk size with a zero-padded tail, playing as chunks arrive.
pub struct PiperSpeech {
    synthesizer: Synthesizer,
    speaker: SpeakerHandle,
}

impl PiperSpeech {
    pub fn new(synthesizer: Synthesizer, speaker: SpeakerHandle) -> Self {
        PiperSpeech {
            synthesizer,
            speaker,
        }
    }
}

impl SpeechOutput for PiperSpeech {
    fn speak(&self, text: &str) -> Result<()> {
        let mut pending: Vec<i16> = Vec::with_capacity(CHUNK_SAMPLES * 2);

        for chunk in self.synthesizer.synthesize(text)? {
            pending.extend(chunk?);

            while pending.len() >= CHUNK_SAMPLES {
                let ready: Vec<i16> = pending.drain(..CHUNK_SAMPLES).collect();
                self.speaker.play_chunk(ready).map_err(SatelliteError::Audio)?;
            }
        }

        if !pending.is_empty() {
            pending.resize(CHUNK_SAMPLES, 0);
            self.speaker
                .play_chunk(pending)
                .map_err(SatelliteError::Audio)?;
        }

        self.speaker.flush().map_err(SatelliteError::Audio)?;
        Ok(())
    }
}
