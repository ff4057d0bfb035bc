//! Template-key selection.
//!
//! Selector functions are registered per intent in an explicit table at
//! startup; each maps a render context to a `<intent>.<context>` key.
//! Intents without a selector use `<intent>.default`.

use std::collections::HashMap;

use super::renderer::Context;

pub type SelectorFn = fn(&Context) -> String;

#[derive(Default)]
pub struct ResponseSelector {
    table: HashMap<String, SelectorFn>,
}

impl ResponseSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, intent: &str, selector: SelectorFn) {
        self.table.insert(intent.to_string(), selector);
    }

    pub fn select(&self, intent: &str, context: &Context) -> String {
        match self.table.get(intent) {
            Some(selector) => selector(context),
            None => format!("{}.default", intent),
        }
    }
}
