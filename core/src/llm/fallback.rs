//! The fallback arbiter: prompt construction, the completion round-trip and
//! post-processing that makes a model reply speakable.

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::LlmConfig;
use crate::llm::{ChatMessage, LlmClient};

/// Spoken when the provider cannot produce a completion.
pub const APOLOGY_REPLY: &str =
    "I'm sorry, but I'm having trouble processing your request right now.";

const FALLBACK_MAX_TOKENS: u32 = 512;
const FALLBACK_TEMPERATURE: f32 = 0.7;
const MAX_SPOKEN_CHARS: usize = 300;

impl LlmClient {
    /// Produce a voice-ready reply for a query the matcher could not place.
    /// Provider failures degrade to a canned apology; the caller always gets
    /// something speakable.
    pub async fn fallback_reply(
        &self,
        config: &LlmConfig,
        text: &str,
        intent: &str,
        confidence: f64,
        user_id: &str,
    ) -> String {
        let mut messages = vec![ChatMessage::system(system_prompt(
            config, intent, confidence,
        ))];
        messages.extend(self.history_for(user_id));
        messages.push(ChatMessage::user(user_prompt(text, intent, confidence)));

        match self
            .provider()
            .complete(&messages, FALLBACK_MAX_TOKENS, FALLBACK_TEMPERATURE)
            .await
        {
            Ok(completion) => {
                let reply = clean_for_voice(&completion.content);
                log::info!(
                    "LLM fallback via {} ({}) answered in {} chars",
                    completion.provider,
                    completion.model,
                    reply.chars().count()
                );
                self.remember(user_id, text, &reply);
                reply
            }
            Err(e) => {
                log::error!("LLM fallback failed: {}", e);
                APOLOGY_REPLY.to_string()
            }
        }
    }
}

fn system_prompt(config: &LlmConfig, intent: &str, confidence: f64) -> String {
    if !config.system_prompt.is_empty() {
        return config.system_prompt.clone();
    }

    let now = Local::now();
    let mut prompt = format!(
        "You are a helpful voice assistant.\n\
         Your responses should be concise, helpful, and conversational.\n\n\
         CONTEXT INFORMATION:\n\
         - Intent detection recognized \"{intent}\" with confidence {confidence:.2}, \
         which was too low to be reliable\n\
         - Current date: {date}\n\
         - Current time: {time}\n\
         - Day of week: {day}\n\
         - Month: {month}\n\
         - Year: {year}\n\
         - Timestamp: {timestamp}\n\n\
         INSTRUCTIONS:\n\
         - Respond to the user's query directly with a helpful, concise answer\n\
         - Use the current context information for anything about the present moment\n\
         - Keep responses short and focused, under 300 characters when possible\n\
         - Admit when you don't know something instead of making it up\n\
         - Format responses to work in a voice conversation: no markdown, links, or special formatting",
        intent = intent,
        confidence = confidence,
        date = now.format("%A, %B %d, %Y"),
        time = now.format("%H:%M"),
        day = now.format("%A"),
        month = now.format("%B"),
        year = now.format("%Y"),
        timestamp = now.to_rfc3339(),
    );

    for context in &config.contexts {
        prompt.push('\n');
        prompt.push_str(context);
    }

    prompt
}

fn user_prompt(text: &str, intent: &str, confidence: f64) -> String {
    format!(
        "The user said: \"{}\"\n\n\
         Intent recognition detected \"{}\" with a confidence of {:.2}, \
         which is too low to be reliable.\n\n\
         Please respond to the user's query directly with a helpful, concise \
         answer that works well spoken aloud.",
        text, intent, confidence
    )
}

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").unwrap());
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]\(.*?\)").unwrap());
static FOOTNOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s+").unwrap());
static LEFTOVER_MARKDOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#>~]").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Strip formatting a model likes to emit so the text reads naturally when
/// spoken, then bound its length at a sentence boundary.
pub fn clean_for_voice(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = CODE_SPAN.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = FOOTNOTE.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = LEFTOVER_MARKDOWN.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n");
    let text = text.replace('\n', " ");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() > MAX_SPOKEN_CHARS {
        truncate_at_sentence(text, MAX_SPOKEN_CHARS)
    } else {
        text.to_string()
    }
}

/// Keep whole sentences while the accumulated length fits the budget.
fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let mut result = String::new();
    let mut result_chars = 0usize;

    for sentence in split_sentences(text) {
        let sentence_chars = sentence.chars().count();
        if result_chars + sentence_chars > max_chars {
            break;
        }
        result.push_str(sentence);
        result.push(' ');
        result_chars += sentence_chars + 1;
    }

    result.trim_end().to_string()
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_i, next_c)) = chars.peek() {
                if next_c.is_whitespace() {
                    sentences.push(text[start..=i].trim());
                    start = next_i;
                }
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_emphasis_and_code() {
        assert_eq!(
            clean_for_voice("This is **bold** and *italic* and `code`."),
            "This is bold and italic and code."
        );
    }

    #[test]
    fn removes_fenced_blocks_entirely() {
        let input = "Run this:\n```\nrm -rf /\n```\nDone.";
        assert_eq!(clean_for_voice(input), "Run this: Done.");
    }

    #[test]
    fn keeps_link_text_and_drops_footnotes() {
        assert_eq!(
            clean_for_voice("See [the docs](https://example.com) for more[1]."),
            "See the docs for more."
        );
    }

    #[test]
    fn flattens_bullets_and_headings() {
        let input = "# Answer\n- first\n- second\n> quoted";
        assert_eq!(clean_for_voice(input), "Answer first second quoted");
    }

    #[test]
    fn collapses_newlines_and_spaces() {
        assert_eq!(
            clean_for_voice("one\n\n\ntwo   three\nfour"),
            "one two three four"
        );
    }

    #[test]
    fn truncates_at_a_sentence_boundary() {
        let sentence = "This sentence is exactly forty characters";
        let input = format!("{s}. {s}. {s}. {s}. {s}. {s}. {s}. {s}.", s = sentence);

        let cleaned = clean_for_voice(&input);
        assert!(cleaned.chars().count() <= 300);
        assert!(cleaned.ends_with('.'));
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(clean_for_voice("Just a reply."), "Just a reply.");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let inputs = [
            "This is **bold** and a [link](https://x.y)[2].\n\n- item",
            "plain text already",
            &"A sentence here. ".repeat(40),
        ];

        for input in inputs {
            let once = clean_for_voice(input);
            assert_eq!(clean_for_voice(&once), once);
        }
    }

    #[test]
    fn system_prompt_prefers_configured_text() {
        let config = LlmConfig {
            system_prompt: "Custom prompt.".to_string(),
            ..Default::default()
        };
        assert_eq!(system_prompt(&config, "fallback", 0.0), "Custom prompt.");
    }

    #[test]
    fn default_system_prompt_injects_intent_and_date() {
        let config = LlmConfig::default();
        let prompt = system_prompt(&config, "get_time", 0.42);

        assert!(prompt.contains("\"get_time\""));
        assert!(prompt.contains("0.42"));
        assert!(prompt.contains(&Local::now().format("%Y").to_string()));
    }

    #[test]
    fn user_prompt_carries_the_query() {
        let prompt = user_prompt("asdf qwerty", "fallback", 0.0);
        assert!(prompt.contains("asdf qwerty"));
        assert!(prompt.contains("\"fallback\""));
    }
}
