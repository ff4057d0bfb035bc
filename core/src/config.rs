//! TOML configuration for the core process.
//!
//! Every field has a default so a missing or malformed file degrades to a
//! working (mock-backed) configuration instead of refusing to start.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 31415,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub implementation: String,
    pub units: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            base_url: "https://api.openweathermap.org/data/2.5/".to_string(),
            api_key: String::new(),
            implementation: "openweathermap".to_string(),
            units: "metric".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub user_agent: String,
    pub implementation: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        GeocodingConfig {
            base_url: "https://nominatim.openstreetmap.org/".to_string(),
            user_agent: "ember".to_string(),
            implementation: "nominatim".to_string(),
        }
    }
}

/// Per-provider settings under `[llm.models.<name>]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    /// Confidence strictly below this routes through the LLM fallback.
    pub fallback_threshold: f64,
    /// Overrides the built-in system prompt when non-empty.
    pub system_prompt: String,
    pub contexts: Vec<String>,
    pub streaming: bool,
    pub models: HashMap<String, ModelConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "openai".to_string(),
            ModelConfig {
                model: "gpt-3.5-turbo".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                ..Default::default()
            },
        );
        models.insert(
            "ollama".to_string(),
            ModelConfig {
                model: "llama3".to_string(),
                base_url: "http://localhost:11434".to_string(),
                ..Default::default()
            },
        );
        models.insert(
            "mock".to_string(),
            ModelConfig {
                max_tokens: Some(50),
                ..Default::default()
            },
        );

        LlmConfig {
            enabled: true,
            provider: "mock".to_string(),
            fallback_threshold: 0.6,
            system_prompt: String::new(),
            contexts: Vec::new(),
            streaming: false,
            models,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the YAML intent data (entities/, sentences/, responses/).
    pub intents_dir: PathBuf,
    pub debug: bool,
    pub server: ServerConfig,
    pub weather: WeatherConfig,
    pub geocoding: GeocodingConfig,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            intents_dir: PathBuf::from("intents"),
            debug: false,
            server: ServerConfig::default(),
            weather: WeatherConfig::default(),
            geocoding: GeocodingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file; any failure logs and yields defaults.
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
                return Self::default();
            }
        };

        match toml::from_str::<AppConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Invalid config {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }
}
