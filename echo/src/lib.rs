//! Echo: a pattern-based intent engine.
//!
//! Entities, intents and response templates are loaded from YAML data
//! directories. [`Echo::process`] classifies user text and extracts typed
//! entities; [`Echo::response`] selects and renders a reply template from a
//! handler-produced context.

pub mod config;
pub mod entity;
pub mod error;
pub mod intent;
pub mod response;
pub mod text;

use std::collections::HashMap;
use std::path::Path;

pub use config::{EchoConfig, EntitySpec, IntentSpec, ResponseSpec, Templates};
pub use entity::{EntityKind, EntityMatch, EntityRegistry};
pub use error::{EchoError, Result};
pub use intent::matcher::{IntentMatcher, MatchOutcome, EXACT_CONFIDENCE, FALLBACK_INTENT};
pub use intent::{IntentDef, IntentRegistry};
pub use response::{Context, ResponseRenderer, ResponseSelector, SelectorFn};

/// Confidence above which a matched pattern is trusted for entity
/// extraction.
const EXTRACTION_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub text: String,
    pub intent: String,
    pub confidence: f64,
    pub pattern: Option<String>,
    pub entities: HashMap<String, Vec<EntityMatch>>,
}

pub struct Echo {
    entities: EntityRegistry,
    intents: IntentRegistry,
    responses: HashMap<String, ResponseSpec>,
    matcher: IntentMatcher,
    selector: ResponseSelector,
    renderer: ResponseRenderer,
}

impl Echo {
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_config(EchoConfig::load(path)?))
    }

    pub fn from_config(config: EchoConfig) -> Self {
        let entities = EntityRegistry::from_specs(&config.entities);
        let intents = IntentRegistry::from_specs(config.intents.iter());

        for (name, spec) in &config.intents {
            if !spec.patterns.is_empty() && !config.responses.contains_key(name) {
                log::warn!("Intent '{}' has patterns but no response templates", name);
            }
        }

        Echo {
            entities,
            intents,
            responses: config.responses,
            matcher: IntentMatcher::default(),
            selector: ResponseSelector::new(),
            renderer: ResponseRenderer,
        }
    }

    /// Register response-key selector functions, chained at construction.
    pub fn with_selectors<'a>(
        mut self,
        selectors: impl IntoIterator<Item = (&'a str, SelectorFn)>,
    ) -> Self {
        for (intent, selector) in selectors {
            self.selector.register(intent, selector);
        }
        self
    }

    pub fn set_fuzzy_threshold(&mut self, threshold: f64) {
        self.matcher.fuzzy_threshold = threshold;
    }

    /// Classify `text` and, for a trusted match, extract the entities the
    /// matched pattern references.
    pub fn process(&self, text: &str) -> ProcessOutcome {
        let outcome = self.matcher.match_text(&self.intents, text, &HashMap::new());

        let mut entities = HashMap::new();
        if outcome.intent != FALLBACK_INTENT && outcome.confidence > EXTRACTION_CONFIDENCE {
            if let Some(pattern) = &outcome.pattern {
                entities = self.entities.extract_from_pattern(text, pattern);
            }
        }

        log::debug!(
            "Processed '{}' -> intent={} confidence={:.2} entities={:?}",
            text,
            outcome.intent,
            outcome.confidence,
            entities.keys().collect::<Vec<_>>()
        );

        ProcessOutcome {
            text: text.to_string(),
            intent: outcome.intent,
            confidence: outcome.confidence,
            pattern: outcome.pattern,
            entities,
        }
    }

    /// Select a template key for `intent` from `context` and render it.
    pub fn response(&self, intent: &str, context: &Context) -> String {
        let key = self.selector.select(intent, context);
        self.renderer.render(&key, context, &self.responses)
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn intents(&self) -> &IntentRegistry {
        &self.intents
    }

    pub fn responses(&self) -> &HashMap<String, ResponseSpec> {
        &self.responses
    }
}
