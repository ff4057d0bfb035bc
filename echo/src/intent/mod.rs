//! Intent definitions and the ordered registry.

pub mod matcher;

use crate::config::IntentSpec;

#[derive(Debug, Clone)]
pub struct IntentDef {
    pub name: String,
    /// Authored patterns, possibly containing `{entity}` placeholders.
    pub patterns: Vec<String>,
    /// Entities that must be present for this intent to match when the
    /// caller supplies pre-extracted entities.
    pub requires: Vec<String>,
}

/// Registration order is significant: it is the matcher's tie-break.
#[derive(Debug, Default)]
pub struct IntentRegistry {
    intents: Vec<IntentDef>,
}

impl IntentRegistry {
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a (String, IntentSpec)>) -> Self {
        let mut registry = IntentRegistry::default();
        for (name, spec) in specs {
            registry.register(IntentDef {
                name: name.clone(),
                patterns: spec.patterns.clone(),
                requires: spec.requires.clone(),
            });
        }
        registry
    }

    /// Register or replace an intent. A replaced intent keeps its original
    /// position.
    pub fn register(&mut self, def: IntentDef) {
        if let Some(slot) = self.intents.iter_mut().find(|i| i.name == def.name) {
            *slot = def;
        } else {
            self.intents.push(def);
        }
    }

    pub fn get(&self, name: &str) -> Option<&IntentDef> {
        self.intents.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntentDef> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}
