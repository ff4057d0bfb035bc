//! Entity definitions and extraction.
//!
//! An entity owns a set of regex patterns, each of which must carry a named
//! capture group matching the entity name. Extraction runs against the
//! original (un-normalised) text in descending pattern specificity and
//! normalises every captured value through the entity kind's
//! [`standard::process_value`].

pub mod extractor;
pub mod standard;

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::config::EntitySpec;
use crate::error::EchoError;
use crate::text;

#[derive(Debug, Clone)]
pub struct EntityMatch {
    pub entity: String,
    /// Normalised value, always a JSON object.
    pub value: Value,
    pub raw_value: String,
    pub start: usize,
    pub end: usize,
    pub specificity: i32,
}

/// Known value normalisers. Unrecognised type tags fall through to
/// [`EntityKind::Other`], which passes the raw string through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Date,
    Time,
    Duration,
    Location,
    Number,
    WeatherCondition,
    Temperature,
    Precipitation,
    Wind,
    Other,
}

impl EntityKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "date" => EntityKind::Date,
            "time" => EntityKind::Time,
            "duration" => EntityKind::Duration,
            "location" => EntityKind::Location,
            "number" => EntityKind::Number,
            "weather_condition" => EntityKind::WeatherCondition,
            "temperature" => EntityKind::Temperature,
            "precipitation" => EntityKind::Precipitation,
            "wind" => EntityKind::Wind,
            _ => EntityKind::Other,
        }
    }
}

pub struct EntityDef {
    pub name: String,
    pub kind: EntityKind,
    pub description: String,
    pub examples: Vec<String>,
    /// Compiled patterns with their specificity, sorted descending.
    patterns: Vec<(Regex, i32)>,
}

impl EntityDef {
    /// Build a definition from its spec. Patterns that fail to compile or
    /// lack the required named capture group are rejected with a logged
    /// error; the entity keeps its remaining patterns.
    pub fn compile(name: &str, spec: &EntitySpec) -> Self {
        let kind = EntityKind::from_tag(spec.kind.as_deref().unwrap_or(name));

        let mut patterns = Vec::with_capacity(spec.patterns.len());
        for pattern in &spec.patterns {
            match compile_pattern(name, pattern) {
                Ok(compiled) => {
                    patterns.push((compiled, text::pattern_specificity(pattern)));
                }
                Err(e) => log::error!("{}", e),
            }
        }
        patterns.sort_by(|a, b| b.1.cmp(&a.1));

        EntityDef {
            name: name.to_string(),
            kind,
            description: spec.description.clone(),
            examples: spec.examples.clone(),
            patterns,
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// All matches of this entity in `text`, highest-specificity patterns
    /// first.
    pub fn extract(&self, text: &str) -> Vec<EntityMatch> {
        let mut results = Vec::new();

        for (regex, specificity) in &self.patterns {
            for caps in regex.captures_iter(text) {
                let Some(group) = caps.name(&self.name) else {
                    continue;
                };

                let raw = group.as_str().to_string();
                results.push(EntityMatch {
                    entity: self.name.clone(),
                    value: standard::process_value(self.kind, &raw),
                    raw_value: raw,
                    start: group.start(),
                    end: group.end(),
                    specificity: *specificity,
                });
            }
        }

        results
    }
}

fn compile_pattern(entity: &str, pattern: &str) -> Result<Regex, EchoError> {
    let compiled = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| EchoError::InvalidPattern {
            entity: entity.to_string(),
            reason: e.to_string(),
        })?;

    let has_group = compiled
        .capture_names()
        .any(|name| name == Some(entity));
    if !has_group {
        return Err(EchoError::InvalidPattern {
            entity: entity.to_string(),
            reason: format!("missing named capture group (?P<{}>...)", entity),
        });
    }

    Ok(compiled)
}

#[derive(Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntityDef>,
}

impl EntityRegistry {
    pub fn from_specs(specs: &HashMap<String, EntitySpec>) -> Self {
        let mut registry = EntityRegistry::default();
        for (name, spec) in specs {
            registry.register(EntityDef::compile(name, spec));
        }
        registry
    }

    pub fn register(&mut self, def: EntityDef) {
        self.entities.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
