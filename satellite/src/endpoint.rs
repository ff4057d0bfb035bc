//! Voice-activity endpointing.
//!
//! Capture arrives in 80 ms (1280-sample) chunks and is re-framed into the
//! classifier's 30 ms (480-sample) frames; the 320 samples left over from
//! each chunk sit in a residual ring until a full frame accumulates. The
//! per-chunk voiced ratio feeds a five-slot window whose mean decides
//! silence; sustained silence ends the capture.

use std::collections::VecDeque;

use webrtc_vad::{SampleRate, Vad, VadMode};

use crate::audio::FRAME_SAMPLES;
use crate::error::{Result, SatelliteError};

pub const VAD_FRAME_SAMPLES: usize = 480;

const RESIDUAL_CAPACITY: usize = 2 * FRAME_SAMPLES;
const RATIO_WINDOW: usize = 5;

/// 30 ms voiced/unvoiced decision.
pub trait VoiceClassifier {
    fn is_voiced(&mut self, frame: &[i16]) -> Result<bool>;
}

pub struct WebRtcClassifier {
    vad: Vad,
}

impl WebRtcClassifier {
    pub fn new() -> Self {
        WebRtcClassifier {
            vad: Vad::new_with_rate_and_mode(SampleRate::Rate16kHz, VadMode::LowBitrate),
        }
    }
}

impl Default for WebRtcClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceClassifier for WebRtcClassifier {
    fn is_voiced(&mut self, frame: &[i16]) -> Result<bool> {
        self.vad
            .is_voice_segment(frame)
            .map_err(|_| SatelliteError::Vad("classifier rejected frame length".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Sustained silence that ends the capture, in seconds.
    pub silence_duration: f32,
    /// Mean voiced ratio strictly below this counts as silence.
    pub silence_ratio: f64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            silence_duration: 1.0,
            silence_ratio: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Continue,
    EndpointReached,
}

/// One capture session: created when the wake fires, consumed when the
/// endpoint is reached.
pub struct VadEndpointer<C: VoiceClassifier> {
    classifier: C,
    silence_ratio: f64,
    chunks_to_endpoint: usize,
    residual: VecDeque<i16>,
    ratios: VecDeque<f64>,
    silent_chunks: usize,
    captured: Vec<i16>,
}

impl<C: VoiceClassifier> VadEndpointer<C> {
    pub fn new(classifier: C, config: EndpointConfig) -> Self {
        let chunks_to_endpoint = (config.silence_duration as f64 * 16_000.0
            / FRAME_SAMPLES as f64)
            .ceil() as usize;

        VadEndpointer {
            classifier,
            silence_ratio: config.silence_ratio,
            chunks_to_endpoint,
            residual: VecDeque::with_capacity(RESIDUAL_CAPACITY),
            ratios: VecDeque::with_capacity(RATIO_WINDOW),
            silent_chunks: 0,
            captured: Vec::new(),
        }
    }

    /// Feed one 80 ms capture chunk; reports whether the endpoint has been
    /// reached. The chunk is kept either way, so the returned audio
    /// includes the trailing silence.
    pub fn feed(&mut self, chunk: &[i16]) -> Result<FeedOutcome> {
        self.captured.extend_from_slice(chunk);

        let mut frames: Vec<Vec<i16>> = chunk
            .chunks_exact(VAD_FRAME_SAMPLES)
            .map(|frame| frame.to_vec())
            .collect();

        self.residual.extend(chunk.chunks_exact(VAD_FRAME_SAMPLES).remainder());
        while self.residual.len() > RESIDUAL_CAPACITY {
            self.residual.pop_front();
        }

        // At most one buffered frame drains per chunk.
        if self.residual.len() >= VAD_FRAME_SAMPLES {
            frames.push(self.residual.drain(..VAD_FRAME_SAMPLES).collect());
        }

        if !frames.is_empty() {
            let mut voiced = 0usize;
            for frame in &frames {
                if self.classifier.is_voiced(frame)? {
                    voiced += 1;
                }
            }

            if self.ratios.len() == RATIO_WINDOW {
                self.ratios.pop_front();
            }
            self.ratios.push_back(voiced as f64 / frames.len() as f64);
        }

        if !self.ratios.is_empty() {
            let mean: f64 = self.ratios.iter().sum::<f64>() / self.ratios.len() as f64;

            if mean < self.silence_ratio {
                self.silent_chunks += 1;
            } else {
                self.silent_chunks = 0;
            }

            if self.silent_chunks >= self.chunks_to_endpoint {
                return Ok(FeedOutcome::EndpointReached);
            }
        }

        Ok(FeedOutcome::Continue)
    }

    /// Everything captured so far, trailing silence included.
    pub fn take_audio(self) -> Vec<i16> {
        self.captured
    }

    pub fn silent_chunks(&self) -> usize {
        self.silent_chunks
    }

    pub fn chunks_to_endpoint(&self) -> usize {
        self.chunks_to_endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted classifier: pops one decision per 30 ms frame.
    struct Scripted {
        decisions: VecDeque<bool>,
    }

    impl Scripted {
        fn voiced_forever() -> Self {
            Scripted {
                decisions: VecDeque::new(),
            }
        }

        fn from(decisions: &[bool]) -> Self {
            Scripted {
                decisions: decisions.iter().copied().collect(),
            }
        }
    }

    impl VoiceClassifier for Scripted {
        fn is_voiced(&mut self, _frame: &[i16]) -> Result<bool> {
            Ok(self.decisions.pop_front().unwrap_or(true))
        }
    }

    /// All decisions false once the script runs out.
    struct Silent;

    impl VoiceClassifier for Silent {
        fn is_voiced(&mut self, _frame: &[i16]) -> Result<bool> {
            Ok(false)
        }
    }

    fn chunk() -> Vec<i16> {
        vec![0; FRAME_SAMPLES]
    }

    #[test]
    fn deadline_is_ceil_of_silence_duration() {
        let endpointer = VadEndpointer::new(Silent, EndpointConfig::default());
        // 1.0 s * 16000 / 1280 = 12.5 -> 13 chunks.
        assert_eq!(endpointer.chunks_to_endpoint(), 13);
    }

    #[test]
    fn immediate_silence_terminates_at_the_deadline_with_audio() {
        let mut endpointer = VadEndpointer::new(Silent, EndpointConfig::default());

        let mut fed = 0;
        loop {
            fed += 1;
            if endpointer.feed(&chunk()).unwrap() == FeedOutcome::EndpointReached {
                break;
            }
            assert!(fed < 100, "endpointer never terminated");
        }

        // Terminates within one chunk of the deadline and keeps every chunk.
        assert_eq!(fed, 13);
        assert_eq!(endpointer.take_audio().len(), 13 * FRAME_SAMPLES);
    }

    #[test]
    fn speech_resets_the_silence_counter() {
        let mut endpointer = VadEndpointer::new(Silent, EndpointConfig::default());
        for _ in 0..5 {
            assert_eq!(endpointer.feed(&chunk()).unwrap(), FeedOutcome::Continue);
        }
        assert_eq!(endpointer.silent_chunks(), 5);

        // Fully voiced chunks drive the window mean back above the
        // threshold.
        let mut voiced = VadEndpointer::new(Scripted::voiced_forever(), EndpointConfig::default());
        for _ in 0..3 {
            voiced.feed(&chunk()).unwrap();
        }
        assert_eq!(voiced.silent_chunks(), 0);
    }

    #[test]
    fn ratio_exactly_at_threshold_is_speech() {
        // Chunk sub-frame counts cycle 2, 3, 3 as the residual ring fills
        // and drains. Script per-chunk ratios [0, 0, 1, 0.5, 0] whose
        // five-slot mean is exactly 0.3.
        let script = [
            false, false, // chunk 1: ratio 0
            false, false, false, // chunk 2: ratio 0
            true, true, true, // chunk 3: ratio 1
            true, false, // chunk 4: ratio 0.5
            false, false, false, // chunk 5: ratio 0
        ];
        let mut endpointer = VadEndpointer::new(Scripted::from(&script), EndpointConfig::default());

        for _ in 0..5 {
            assert_eq!(endpointer.feed(&chunk()).unwrap(), FeedOutcome::Continue);
        }

        // Mean 0.3 is not silence: strict less-than.
        assert_eq!(endpointer.silent_chunks(), 0);
    }

    #[test]
    fn residual_samples_form_extra_frames() {
        // 1280 = 2 * 480 + 320: chunk one leaves 320 residual samples,
        // chunk two brings it to 640 and drains one extra frame.
        let mut counted = 0usize;

        struct Counting<'a>(&'a mut usize);
        impl VoiceClassifier for Counting<'_> {
            fn is_voiced(&mut self, frame: &[i16]) -> Result<bool> {
                assert_eq!(frame.len(), VAD_FRAME_SAMPLES);
                *self.0 += 1;
                Ok(false)
            }
        }

        let mut endpointer =
            VadEndpointer::new(Counting(&mut counted), EndpointConfig::default());
        endpointer.feed(&chunk()).unwrap();
        endpointer.feed(&chunk()).unwrap();
        drop(endpointer);

        assert_eq!(counted, 2 + 3);
    }

    #[test]
    fn shorter_silence_window_ends_sooner() {
        let config = EndpointConfig {
            silence_duration: 0.5,
            ..Default::default()
        };
        let mut endpointer = VadEndpointer::new(Silent, config);
        // 0.5 s * 16000 / 1280 = 6.25 -> 7 chunks.
        assert_eq!(endpointer.chunks_to_endpoint(), 7);

        let mut fed = 0;
        while endpointer.feed(&chunk()).unwrap() == FeedOutcome::Continue {
            fed += 1;
            assert!(fed < 100);
        }
        assert_eq!(fed + 1, 7);
    }
}
