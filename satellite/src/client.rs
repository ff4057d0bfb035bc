//! HTTP client for the core's ask endpoint. One long-lived client; network
//! failures surface as errors the state machine converts into the canned
//! connection phrase.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::CoreConfig;
use crate::error::{Result, SatelliteError};
use crate::runner::AskBackend;

#[derive(Debug, Clone, Deserialize)]
pub struct AskReply {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

pub struct CoreClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoreClient {
    pub fn from_config(config: &CoreConfig) -> Self {
        CoreClient {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl AskBackend for CoreClient {
    async fn ask(&self, text: &str, user_id: &str, device_id: &str) -> Result<AskReply> {
        let url = format!("{}/v0/ask", self.base_url);
        let payload = json!({
            "text": text,
            "user_id": user_id,
            "device_id": device_id,
        });

        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SatelliteError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SatelliteError::Network(format!(
                "core returned {}",
                response.status()
            )));
        }

        response
            .json::<AskReply>()
            .await
            .map_err(|e| SatelliteError::Network(e.to_string()))
    }
}
