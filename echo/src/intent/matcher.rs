//! Two-pass intent matching.
//!
//! Pass one expands each authored pattern into an anchored regex, filling
//! `{entity}` placeholders with escaped extracted values when available and
//! a permissive word/space class otherwise. Pass two tolerates casual
//! phrasing by comparing the pattern's stripped surface form against the
//! normalised text with a subsequence ratio. Anything below the fuzzy
//! threshold becomes the `fallback` sentinel at confidence zero.

use std::collections::HashMap;

use regex::RegexBuilder;

use super::IntentRegistry;
use crate::entity::EntityMatch;
use crate::text;

pub const FALLBACK_INTENT: &str = "fallback";

/// Confidence assigned to an anchored regex match.
pub const EXACT_CONFIDENCE: f64 = 0.95;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub intent: String,
    /// Always in `[0, 1]`; zero exactly when `intent` is the fallback
    /// sentinel.
    pub confidence: f64,
    pub pattern: Option<String>,
}

impl MatchOutcome {
    fn fallback() -> Self {
        MatchOutcome {
            intent: FALLBACK_INTENT.to_string(),
            confidence: 0.0,
            pattern: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentMatcher {
    pub fuzzy_threshold: f64,
}

impl Default for IntentMatcher {
    fn default() -> Self {
        IntentMatcher {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl IntentMatcher {
    pub fn with_threshold(fuzzy_threshold: f64) -> Self {
        IntentMatcher { fuzzy_threshold }
    }

    pub fn match_text(
        &self,
        registry: &IntentRegistry,
        text: &str,
        entities: &HashMap<String, Vec<EntityMatch>>,
    ) -> MatchOutcome {
        let normalized = text::normalize(text);

        if let Some(outcome) = self.exact_pass(registry, &normalized, entities) {
            return outcome;
        }

        self.fuzzy_pass(registry, &normalized)
            .unwrap_or_else(MatchOutcome::fallback)
    }

    fn exact_pass(
        &self,
        registry: &IntentRegistry,
        normalized: &str,
        entities: &HashMap<String, Vec<EntityMatch>>,
    ) -> Option<MatchOutcome> {
        for intent in registry.iter() {
            if !entities.is_empty()
                && intent.requires.iter().any(|req| !entities.contains_key(req))
            {
                continue;
            }

            for pattern in &intent.patterns {
                let expanded = expand_pattern(pattern, entities);
                let anchored = format!("^{}$", expanded);

                let regex = match RegexBuilder::new(&anchored).case_insensitive(true).build() {
                    Ok(regex) => regex,
                    Err(e) => {
                        log::debug!("Unbuildable pattern '{}': {}", pattern, e);
                        continue;
                    }
                };

                if regex.is_match(normalized) {
                    return Some(MatchOutcome {
                        intent: intent.name.clone(),
                        confidence: EXACT_CONFIDENCE,
                        pattern: Some(pattern.clone()),
                    });
                }
            }
        }

        None
    }

    fn fuzzy_pass(&self, registry: &IntentRegistry, normalized: &str) -> Option<MatchOutcome> {
        let mut best: Option<(f64, &str, &str)> = None;

        for intent in registry.iter() {
            for pattern in &intent.patterns {
                let surface = text::strip_for_fuzzy(pattern);
                let ratio = text::similarity_ratio(&surface, normalized);

                // Strictly greater: earlier registration wins ties.
                if best.map_or(true, |(b, _, _)| ratio > b) {
                    best = Some((ratio, intent.name.as_str(), pattern.as_str()));
                }
            }
        }

        let (ratio, intent, pattern) = best?;
        if ratio < self.fuzzy_threshold {
            return None;
        }

        Some(MatchOutcome {
            intent: intent.to_string(),
            confidence: ratio,
            pattern: Some(pattern.to_string()),
        })
    }
}

/// Replace `{entity}` placeholders: extracted entities contribute their
/// first (highest-specificity) raw value, escaped; everything else becomes
/// a permissive word/space class.
fn expand_pattern(pattern: &str, entities: &HashMap<String, Vec<EntityMatch>>) -> String {
    let mut expanded = pattern.to_string();

    for name in text::placeholders(pattern) {
        let placeholder = format!("{{{}}}", name);
        let replacement = entities
            .get(&name)
            .and_then(|matches| matches.first())
            .map(|m| regex::escape(&m.raw_value))
            .unwrap_or_else(|| r"[\w\s]+".to_string());

        expanded = expanded.replace(&placeholder, &replacement);
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentDef;
    use serde_json::json;

    fn registry(intents: &[(&str, &[&str])]) -> IntentRegistry {
        let mut registry = IntentRegistry::default();
        for (name, patterns) in intents {
            registry.register(IntentDef {
                name: name.to_string(),
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
                requires: vec![],
            });
        }
        registry
    }

    fn entity(name: &str, raw: &str) -> (String, Vec<EntityMatch>) {
        (
            name.to_string(),
            vec![EntityMatch {
                entity: name.to_string(),
                value: json!({ "name": raw }),
                raw_value: raw.to_string(),
                start: 0,
                end: raw.len(),
                specificity: 0,
            }],
        )
    }

    #[test]
    fn exact_match_scores_095() {
        let registry = registry(&[("get_time", &["what time is it"])]);
        let matcher = IntentMatcher::default();

        let outcome = matcher.match_text(&registry, "What time is it?", &HashMap::new());
        assert_eq!(outcome.intent, "get_time");
        assert_eq!(outcome.confidence, EXACT_CONFIDENCE);
        assert_eq!(outcome.pattern.as_deref(), Some("what time is it"));
    }

    #[test]
    fn placeholders_match_arbitrary_words() {
        let registry = registry(&[("get_weather", &["what's the weather in {location}"])]);
        let matcher = IntentMatcher::default();

        let outcome = matcher.match_text(
            &registry,
            "what's the weather in new york",
            &HashMap::new(),
        );
        assert_eq!(outcome.intent, "get_weather");
        assert_eq!(outcome.confidence, EXACT_CONFIDENCE);
    }

    #[test]
    fn extracted_entities_pin_placeholder_values() {
        let registry = registry(&[("get_weather", &["weather in {location}"])]);
        let matcher = IntentMatcher::default();
        let entities: HashMap<_, _> = [entity("location", "Seattle")].into_iter().collect();

        let outcome = matcher.match_text(&registry, "weather in Seattle", &entities);
        assert_eq!(outcome.intent, "get_weather");

        // A different city no longer satisfies the pinned pattern exactly,
        // but the fuzzy pass still recognises the phrasing.
        let outcome = matcher.match_text(&registry, "weather in Denver", &entities);
        assert!(outcome.confidence < EXACT_CONFIDENCE);
    }

    #[test]
    fn missing_required_entity_skips_intent() {
        let mut registry = registry(&[]);
        registry.register(IntentDef {
            name: "get_weather".into(),
            patterns: vec!["weather in {location}".into()],
            requires: vec!["location".into()],
        });
        let matcher = IntentMatcher::default();

        let entities: HashMap<_, _> = [entity("date", "tomorrow")].into_iter().collect();
        let outcome = matcher.match_text(&registry, "weather in seattle", &entities);
        assert_ne!(outcome.confidence, EXACT_CONFIDENCE);
    }

    #[test]
    fn fuzzy_match_tolerates_casual_phrasing() {
        let registry = registry(&[("get_time", &["what time is it"])]);
        let matcher = IntentMatcher::default();

        let outcome = matcher.match_text(&registry, "time is it what", &HashMap::new());
        assert_eq!(outcome.intent, "get_time");
        assert!(outcome.confidence >= matcher.fuzzy_threshold);
        assert!(outcome.confidence < EXACT_CONFIDENCE);
    }

    #[test]
    fn gibberish_falls_back_at_zero() {
        let registry = registry(&[("get_time", &["what time is it"])]);
        let matcher = IntentMatcher::default();

        let outcome = matcher.match_text(&registry, "qqq zzz xxx", &HashMap::new());
        assert_eq!(outcome.intent, FALLBACK_INTENT);
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.pattern.is_none());
    }

    #[test]
    fn confidence_is_zero_iff_fallback() {
        let registry = registry(&[("greeting", &["hello"])]);
        let matcher = IntentMatcher::default();

        for text in ["hello", "hello there friend", "zzzz qqqq"] {
            let outcome = matcher.match_text(&registry, text, &HashMap::new());
            assert!(outcome.confidence >= 0.0 && outcome.confidence <= 1.0);
            assert_eq!(outcome.confidence == 0.0, outcome.intent == FALLBACK_INTENT);
        }
    }

    #[test]
    fn registration_order_breaks_exact_ties() {
        let registry = registry(&[("first", &["hello"]), ("second", &["hello"])]);
        let matcher = IntentMatcher::default();

        let outcome = matcher.match_text(&registry, "hello", &HashMap::new());
        assert_eq!(outcome.intent, "first");
    }

    #[test]
    fn registration_order_breaks_fuzzy_ties() {
        let registry = registry(&[("first", &["hello world"]), ("second", &["hello world"])]);
        let matcher = IntentMatcher::default();

        // Ratio 2*9/(9+11) = 0.9: fuzzy, identical for both intents.
        let outcome = matcher.match_text(&registry, "hello wor", &HashMap::new());
        assert_eq!(outcome.intent, "first");
        assert!(outcome.confidence < EXACT_CONFIDENCE);
    }

    #[test]
    fn threshold_is_tunable() {
        let registry = registry(&[("get_time", &["what time is it"])]);
        let strict = IntentMatcher::with_threshold(0.99);

        let outcome = strict.match_text(&registry, "time is it what", &HashMap::new());
        assert_eq!(outcome.intent, FALLBACK_INTENT);
    }

    #[test]
    fn ratio_at_threshold_matches() {
        // Surface "abcde" vs text "abc": ratio = 2*3/8 = 0.75.
        let registry = registry(&[("short", &["abcde"])]);
        let matcher = IntentMatcher::with_threshold(0.75);

        let outcome = matcher.match_text(&registry, "abc", &HashMap::new());
        assert_eq!(outcome.intent, "short");
        assert!((outcome.confidence - 0.75).abs() < 1e-9);
    }
}
