//! JSON configuration for the satellite. A malformed or missing file logs
//! the cause and falls back to defaults; individual sections default
//! independently.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AsrKind {
    Whisper,
    Google,
    Vosk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TtsKind {
    Piper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LedDriverKind {
    Auto,
    Apa102,
    Neopixel,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrConfig {
    #[serde(rename = "type")]
    pub kind: AsrKind,
    pub model_path: Option<String>,
    pub api_key: Option<String>,
}

impl Default for AsrConfig {
    fn default() -> Self {
        AsrConfig {
            kind: AsrKind::Whisper,
            model_path: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    #[serde(rename = "type")]
    pub kind: TtsKind,
    pub model_path: String,
    /// Piper binary to run; looked up on PATH when not set.
    pub binary: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        TtsConfig {
            kind: TtsKind::Piper,
            model_path: "models/piper/en_GB-cori-high.onnx".to_string(),
            binary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    pub model_paths: Vec<String>,
    pub threshold: f32,
}

impl Default for WakeConfig {
    fn default() -> Self {
        WakeConfig {
            model_paths: vec!["models/wake/hey_ember.tflite".to_string()],
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            url: "http://localhost:31415".to_string(),
            api_key: None,
        }
    }
}

/// RGB colour accepted as `[r, g, b]` or `"#RRGGBB"`; serialises as a
/// triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Default for Color {
    fn default() -> Self {
        Color(255, 80, 0)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Rgb([u8; 3]),
            Hex(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Rgb([r, g, b]) => Ok(Color(r, g, b)),
            Repr::Hex(hex) => Ok(parse_hex_color(&hex).unwrap_or_else(|| {
                log::warn!("Invalid colour '{}', using default", hex);
                Color::default()
            })),
        }
    }
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some(Color(r, g, b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedSchedule {
    pub enabled: bool,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for LedSchedule {
    fn default() -> Self {
        LedSchedule {
            enabled: true,
            start_hour: 7,
            end_hour: 22,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    pub driver_type: LedDriverKind,
    pub num_leds: usize,
    pub brightness: u8,
    pub base_color: Color,
    pub schedule: LedSchedule,
}

impl Default for LedConfig {
    fn default() -> Self {
        LedConfig {
            driver_type: LedDriverKind::Auto,
            num_leds: 3,
            brightness: 10,
            base_color: Color::default(),
            schedule: LedSchedule::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub asr: AsrConfig,
    pub tts: TtsConfig,
    pub wake: WakeConfig,
    pub core: CoreConfig,
    pub led: LedConfig,
}

impl Config {
    /// Load from a JSON file; failures log and yield defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!(
                    "Could not read config {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                return Config::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Invalid config {}: {}. Using defaults.", path.display(), e);
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.asr.kind, AsrKind::Whisper);
        assert_eq!(config.wake.threshold, 0.5);
        assert_eq!(config.core.url, "http://localhost:31415");
        assert_eq!(config.led.num_leds, 3);
        assert!(config.led.schedule.enabled);
    }

    #[test]
    fn parses_a_full_config() {
        let raw = r#"{
            "asr": {"type": "vosk", "model_path": "models/vosk"},
            "tts": {"type": "piper", "model_path": "voice.onnx"},
            "wake": {"model_paths": ["a.tflite", "b.tflite"], "threshold": 0.7},
            "core": {"url": "http://core:31415", "api_key": "secret"},
            "led": {
                "driver_type": "apa102",
                "num_leds": 12,
                "brightness": 20,
                "base_color": [0, 128, 255],
                "schedule": {"enabled": false, "start_hour": 8, "end_hour": 23}
            }
        }"#;

        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.asr.kind, AsrKind::Vosk);
        assert_eq!(config.wake.model_paths.len(), 2);
        assert_eq!(config.wake.threshold, 0.7);
        assert_eq!(config.led.driver_type, LedDriverKind::Apa102);
        assert_eq!(config.led.base_color, Color(0, 128, 255));
        assert!(!config.led.schedule.enabled);
    }

    #[test]
    fn hex_colours_are_accepted() {
        let raw = r#"{"led": {"base_color": "#FF5000"}}"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.led.base_color, Color(255, 80, 0));
    }

    #[test]
    fn bad_hex_colour_falls_back_to_default() {
        let raw = r#"{"led": {"base_color": "#XYZ"}}"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.led.base_color, Color::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "{{ not json").unwrap();

        let config = Config::from_file(file.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = Config::default();
        config.asr.kind = AsrKind::Google;
        config.asr.api_key = Some("key".to_string());
        config.wake.threshold = 0.65;
        config.led.base_color = Color(10, 20, 30);
        config.led.schedule.start_hour = 9;

        let serialized = serde_json::to_string(&config).unwrap();
        let reparsed: Config = serde_json::from_str(&serialized).unwrap();
        assert_eq!(reparsed, config);
    }
}
