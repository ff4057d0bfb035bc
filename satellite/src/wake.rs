//! Wake phrase detection.
//!
//! One or more keyword models score every 80 ms capture frame; any score
//! above the shared threshold fires a wake event and resets detector state
//! so the tail of old audio cannot re-trigger.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;

use tflitec::interpreter::{Interpreter, Options};
use tflitec::model::Model;
use tflitec::tensor;

use crate::config::WakeConfig;
use crate::error::{Result, SatelliteError};

/// Samples of context a keyword model scores at once (1 s at 16 kHz).
const MODEL_WINDOW_SAMPLES: usize = 16_000;

#[derive(Debug, Clone)]
pub struct WakeEvent {
    pub model: String,
    pub score: f32,
}

/// Scores one keyword against successive audio frames. Implementations
/// keep their own rolling context; `reset` must clear it.
pub trait KeywordScorer {
    fn name(&self) -> &str;
    fn score(&mut self, frame: &[i16]) -> Result<f32>;
    fn reset(&mut self);
}

/// TensorFlow Lite keyword model: the trailing second of audio goes in,
/// one confidence score comes out.
pub struct TfLiteKeyword {
    name: String,
    model: Model<'static>,
    window: VecDeque<f32>,
}

impl TfLiteKeyword {
    pub fn load(path: &str) -> Result<Self> {
        let model = Model::new(path)
            .map_err(|e| SatelliteError::Wake(format!("failed to load model {}: {}", path, e)))?;

        let name = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("wake")
            .to_string();

        log::info!("Loaded wake model '{}' from {}", name, path);

        Ok(TfLiteKeyword {
            name,
            model,
            window: VecDeque::with_capacity(MODEL_WINDOW_SAMPLES),
        })
    }
}

impl KeywordScorer for TfLiteKeyword {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&mut self, frame: &[i16]) -> Result<f32> {
        for &sample in frame {
            if self.window.len() == MODEL_WINDOW_SAMPLES {
                self.window.pop_front();
            }
            self.window.push_back(sample as f32 / 32768.0);
        }

        // Not enough context yet; stay silent rather than score noise.
        if self.window.len() < MODEL_WINDOW_SAMPLES {
            return Ok(0.0);
        }

        let input: Vec<f32> = self.window.iter().copied().collect();

        let mut options = Options::default();
        options.thread_count = 1;

        let interpreter = Interpreter::new(&self.model, Some(options))
            .map_err(|e| SatelliteError::Wake(format!("interpreter: {}", e)))?;

        let shape = tensor::Shape::new(vec![1, MODEL_WINDOW_SAMPLES]);
        interpreter
            .resize_input(0, shape)
            .map_err(|e| SatelliteError::Wake(format!("resize input: {}", e)))?;
        interpreter
            .allocate_tensors()
            .map_err(|e| SatelliteError::Wake(format!("allocate tensors: {}", e)))?;
        interpreter
            .copy(&input, 0)
            .map_err(|e| SatelliteError::Wake(format!("copy input: {}", e)))?;
        interpreter
            .invoke()
            .map_err(|e| SatelliteError::Wake(format!("inference: {}", e)))?;

        let output = interpreter
            .output(0)
            .map_err(|e| SatelliteError::Wake(format!("output tensor: {}", e)))?;

        let data = output.data::<f32>();
        let score = data.first().copied().unwrap_or(0.0);

        Ok(score.clamp(0.0, 1.0))
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

pub struct WakeService {
    scorers: Vec<Box<dyn KeywordScorer>>,
    pub threshold: f32,
}

impl WakeService {
    pub fn from_config(config: &WakeConfig) -> Result<Self> {
        let mut scorers: Vec<Box<dyn KeywordScorer>> = Vec::new();
        for path in &config.model_paths {
            scorers.push(Box::new(TfLiteKeyword::load(path)?));
        }

        if scorers.is_empty() {
            return Err(SatelliteError::Wake("no wake models configured".to_string()));
        }

        Ok(WakeService {
            scorers,
            threshold: config.threshold,
        })
    }

    pub fn new(scorers: Vec<Box<dyn KeywordScorer>>, threshold: f32) -> Self {
        WakeService { scorers, threshold }
    }

    /// Score one frame against every model.
    pub fn process(&mut self, frame: &[i16]) -> Result<HashMap<String, f32>> {
        let mut scores = HashMap::with_capacity(self.scorers.len());
        for scorer in &mut self.scorers {
            let score = scorer.score(frame)?;
            scores.insert(scorer.name().to_string(), score);
        }
        Ok(scores)
    }

    /// Score one frame; a score above the threshold fires and resets.
    pub fn detect(&mut self, frame: &[i16]) -> Result<Option<WakeEvent>> {
        let scores = self.process(frame)?;

        for (model, score) in scores {
            if score > self.threshold {
                log::info!("Wake word '{}' detected (score {:.3})", model, score);
                self.reset();
                return Ok(Some(WakeEvent { model, score }));
            }
        }

        Ok(None)
    }

    pub fn reset(&mut self) {
        for scorer in &mut self.scorers {
            scorer.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedScorer {
        name: String,
        scores: Vec<f32>,
        position: usize,
        resets: usize,
    }

    impl ScriptedScorer {
        fn new(name: &str, scores: Vec<f32>) -> Self {
            ScriptedScorer {
                name: name.to_string(),
                scores,
                position: 0,
                resets: 0,
            }
        }
    }

    impl KeywordScorer for ScriptedScorer {
        fn name(&self) -> &str {
            &self.name
        }

        fn score(&mut self, _frame: &[i16]) -> Result<f32> {
            let score = self.scores.get(self.position).copied().unwrap_or(0.0);
            self.position += 1;
            Ok(score)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn frame() -> Vec<i16> {
        vec![0; 1280]
    }

    #[test]
    fn process_reports_a_score_per_model() {
        let mut service = WakeService::new(
            vec![
                Box::new(ScriptedScorer::new("alpha", vec![0.1])),
                Box::new(ScriptedScorer::new("beta", vec![0.2])),
            ],
            0.5,
        );

        let scores = service.process(&frame()).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["alpha"], 0.1);
        assert_eq!(scores["beta"], 0.2);
    }

    #[test]
    fn detect_fires_above_threshold_and_resets() {
        let mut service = WakeService::new(
            vec![Box::new(ScriptedScorer::new("alpha", vec![0.3, 0.7]))],
            0.5,
        );

        assert!(service.detect(&frame()).unwrap().is_none());

        let event = service.detect(&frame()).unwrap().expect("wake event");
        assert_eq!(event.model, "alpha");
        assert_eq!(event.score, 0.7);
    }

    #[test]
    fn score_exactly_at_threshold_does_not_fire() {
        let mut service = WakeService::new(
            vec![Box::new(ScriptedScorer::new("alpha", vec![0.5]))],
            0.5,
        );

        assert!(service.detect(&frame()).unwrap().is_none());
    }

    #[test]
    fn any_of_several_models_can_fire() {
        let mut service = WakeService::new(
            vec![
                Box::new(ScriptedScorer::new("quiet", vec![0.1])),
                Box::new(ScriptedScorer::new("loud", vec![0.9])),
            ],
            0.5,
        );

        let event = service.detect(&frame()).unwrap().expect("wake event");
        assert_eq!(event.model, "loud");
    }
}
