//! LLM fallback: provider selection, conversation memory and the
//! voice-ready completion path.

pub mod fallback;
pub mod provider;

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use provider::LlmProvider;

/// Trailing entries of per-user conversation history that are retained.
pub const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

pub struct LlmClient {
    provider: LlmProvider,
    history: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl LlmClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        LlmClient {
            provider: LlmProvider::from_config(&config.provider, &config.models),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    pub fn history_for(&self, user_id: &str) -> Vec<ChatMessage> {
        self.history
            .lock()
            .map(|h| h.get(user_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Record one exchange, keeping only the trailing [`MAX_HISTORY`]
    /// entries for the user.
    pub fn remember(&self, user_id: &str, user_text: &str, assistant_text: &str) {
        let Ok(mut history) = self.history.lock() else {
            log::error!("Conversation history lock poisoned; dropping exchange");
            return;
        };

        let entries = history.entry(user_id.to_string()).or_default();
        entries.push(ChatMessage::user(user_text));
        entries.push(ChatMessage::assistant(assistant_text));

        if entries.len() > MAX_HISTORY {
            let excess = entries.len() - MAX_HISTORY;
            entries.drain(..excess);
        }
    }

    pub fn clear_history(&self, user_id: &str) {
        if let Ok(mut history) = self.history.lock() {
            history.remove(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped_at_ten_entries() {
        let client = LlmClient::from_config(&LlmConfig::default());

        for i in 0..8 {
            client.remember("alice", &format!("q{}", i), &format!("a{}", i));
        }

        let history = client.history_for("alice");
        assert_eq!(history.len(), MAX_HISTORY);
        // Oldest exchanges dropped, latest kept.
        assert_eq!(history.last().unwrap().content, "a7");
        assert_eq!(history.first().unwrap().content, "q3");
    }

    #[test]
    fn history_is_per_user() {
        let client = LlmClient::from_config(&LlmConfig::default());
        client.remember("alice", "hi", "hello");

        assert_eq!(client.history_for("alice").len(), 2);
        assert!(client.history_for("bob").is_empty());
    }

    #[test]
    fn clear_history_forgets_a_user() {
        let client = LlmClient::from_config(&LlmConfig::default());
        client.remember("alice", "hi", "hello");
        client.clear_history("alice");
        assert!(client.history_for("alice").is_empty());
    }
}
