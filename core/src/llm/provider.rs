//! LLM providers as a tagged sum type, constructed once at startup from the
//! configured name. Each provider owns a long-lived HTTP client.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde_json::json;

use crate::config::ModelConfig;
use crate::error::{CoreError, Result};
use crate::llm::ChatMessage;

#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub provider: String,
}

pub enum LlmProvider {
    Mock(MockProvider),
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
}

impl LlmProvider {
    /// Build the configured provider. Unknown names log an error and fall
    /// back to the mock provider so the core still starts.
    pub fn from_config(name: &str, models: &HashMap<String, ModelConfig>) -> Self {
        let model_config = models.get(name).cloned().unwrap_or_default();

        match name {
            "mock" => LlmProvider::Mock(MockProvider::new(&model_config)),
            "ollama" => LlmProvider::Ollama(OllamaProvider::new(&model_config)),
            "openai" => LlmProvider::OpenAi(OpenAiProvider::new(&model_config)),
            other => {
                log::error!("Unknown LLM provider '{}', falling back to mock", other);
                LlmProvider::Mock(MockProvider::new(&ModelConfig::default()))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Mock(_) => "mock",
            LlmProvider::Ollama(_) => "ollama",
            LlmProvider::OpenAi(_) => "openai",
        }
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Completion> {
        match self {
            LlmProvider::Mock(p) => Ok(p.complete(messages, max_tokens)),
            LlmProvider::Ollama(p) => p.complete(messages, max_tokens, temperature).await,
            LlmProvider::OpenAi(p) => p.complete(messages, max_tokens, temperature).await,
        }
    }
}

/// Canned-response provider for tests and keyless deployments.
pub struct MockProvider {
    responses: Vec<&'static str>,
    max_tokens: usize,
}

impl MockProvider {
    pub fn new(config: &ModelConfig) -> Self {
        MockProvider {
            responses: vec![
                "I'll help you with that.",
                "I'm not sure I understand, could you rephrase?",
                "Here's what I found for you.",
                "That's an interesting question.",
                "I don't have specific information on that topic.",
            ],
            max_tokens: config.max_tokens.unwrap_or(50) as usize,
        }
    }

    pub fn complete(&self, messages: &[ChatMessage], max_tokens: u32) -> Completion {
        let user_message = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let mut content = self
            .responses
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("I'll help you with that.")
            .to_string();

        if !user_message.is_empty() {
            content.push_str(&format!(" Regarding '{}...'", user_message));
        }

        let limit = self.max_tokens.min(max_tokens as usize);
        let content: String = content.chars().take(limit).collect();

        Completion {
            content,
            model: "mock-model".to_string(),
            provider: "mock".to_string(),
        }
    }
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(config: &ModelConfig) -> Self {
        let base_url = if config.base_url.is_empty() {
            "http://localhost:11434".to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        OllamaProvider {
            client: reqwest::Client::new(),
            base_url,
            model: if config.model.is_empty() {
                "llama3".to_string()
            } else {
                config.model.clone()
            },
        }
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Completion> {
        let system: Option<&str> = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str());
        let chat: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != "system").collect();

        let mut payload = json!({
            "model": self.model,
            "messages": chat,
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        });
        if let Some(system) = system {
            payload["system"] = json!(system);
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Llm(format!(
                "Ollama API error: {} - {}",
                status, body
            )));
        }

        let data: serde_json::Value = response.json().await?;
        let content = data["message"]["content"].as_str().unwrap_or("").to_string();

        Ok(Completion {
            content,
            model: self.model.clone(),
            provider: "ollama".to_string(),
        })
    }
}

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &ModelConfig) -> Self {
        let base_url = if config.base_url.is_empty() {
            "https://api.openai.com/v1".to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        OpenAiProvider {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url,
            model: if config.model.is_empty() {
                "gpt-3.5-turbo".to_string()
            } else {
                config.model.clone()
            },
        }
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Completion> {
        if self.api_key.is_empty() {
            return Err(CoreError::Llm("OpenAI API key not configured".to_string()));
        }

        let payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Llm(format!(
                "OpenAI API error: {} - {}",
                status, body
            )));
        }

        let data: serde_json::Value = response.json().await?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        let model = data["model"].as_str().unwrap_or(&self.model).to_string();

        Ok(Completion {
            content,
            model,
            provider: "openai".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_falls_back_to_mock() {
        let provider = LlmProvider::from_config("nonexistent", &HashMap::new());
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn mock_completion_echoes_the_query_within_its_cap() {
        let mock = MockProvider::new(&ModelConfig {
            max_tokens: Some(50),
            ..Default::default()
        });

        let messages = vec![
            ChatMessage::system("You are a voice assistant."),
            ChatMessage::user("what is the airspeed of an unladen swallow"),
        ];

        let completion = mock.complete(&messages, 512);
        assert!(completion.content.chars().count() <= 50);
        assert_eq!(completion.provider, "mock");
    }

    #[test]
    fn mock_respects_the_smaller_request_cap() {
        let mock = MockProvider::new(&ModelConfig {
            max_tokens: Some(500),
            ..Default::default()
        });

        let completion = mock.complete(&[ChatMessage::user("hello")], 10);
        assert!(completion.content.chars().count() <= 10);
    }

    #[test]
    fn openai_without_key_is_an_error() {
        let provider = OpenAiProvider::new(&ModelConfig::default());
        let err = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(provider.complete(&[ChatMessage::user("hi")], 16, 0.7));
        assert!(err.is_err());
    }
}
