//! Pattern-driven extraction: given the intent pattern that matched, pull
//! out only the entities its `{name}` placeholders reference.

use std::collections::HashMap;

use super::{EntityMatch, EntityRegistry};
use crate::text;

impl EntityRegistry {
    /// Extract every entity referenced by `pattern` from the original
    /// (un-normalised) text. Entities with no matches are omitted; unknown
    /// entity names are ignored.
    pub fn extract_from_pattern(
        &self,
        text: &str,
        pattern: &str,
    ) -> HashMap<String, Vec<EntityMatch>> {
        let mut results = HashMap::new();

        for name in text::placeholders(pattern) {
            let Some(entity) = self.get(&name) else {
                log::debug!("Pattern references unregistered entity '{}'", name);
                continue;
            };

            let matches = entity.extract(text);
            if !matches.is_empty() {
                results.insert(name, matches);
            }
        }

        results
    }
}
